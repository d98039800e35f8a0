//! Record types of the CFP tracker: talks and the conferences they are
//! proposed to.

use ghaad::{Collection, CollectionNames, Record};
use reqwest::Url;
use serde::{Deserialize, Serialize};

pub const TALKS: &str = "talks";
pub const CONFERENCES: &str = "conferences";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Talk {
    pub id: String,
    pub title: String,
    pub description: String,
    pub outline: String,
    pub ideal_duration_minutes: f64,
}

impl Record for Talk {
    fn validate(&self) -> Result<(), String> {
        if self.ideal_duration_minutes.is_sign_negative() {
            return Err("idealDurationMinutes must not be negative".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conference {
    pub id: String,
    pub name: String,
    pub url: String,
    pub start_date: String,
    pub end_date: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Empty when the call for papers has no announced window.
    #[serde(default)]
    pub cfp_start_date: String,
    #[serde(default)]
    pub cfp_end_date: String,
    pub cfp_url: String,
    #[serde(default)]
    pub proposed_talks: Vec<ProposedTalk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedTalk {
    pub id: String,
    pub status: ProposalStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Proposed,
    Declined,
    Accepted,
}

impl Record for Conference {
    fn validate(&self) -> Result<(), String> {
        non_empty("name", &self.name)?;
        non_empty("location", &self.location)?;
        url("url", &self.url)?;
        url("cfpUrl", &self.cfp_url)?;
        us_date("startDate", &self.start_date)?;
        us_date("endDate", &self.end_date)?;
        optional_us_date("cfpStartDate", &self.cfp_start_date)?;
        optional_us_date("cfpEndDate", &self.cfp_end_date)?;
        Ok(())
    }
}

/// Collections registered with the engine.
pub fn collections() -> Vec<Collection> {
    vec![
        Collection::new(TALKS, CollectionNames::new("Talk", "Talks", "talks")).with_schema::<Talk>(),
        Collection::new(
            CONFERENCES,
            CollectionNames::new("Conference", "Conferences", "conferences"),
        )
        .with_schema::<Conference>(),
    ]
}

fn non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(())
}

fn url(field: &str, value: &str) -> Result<(), String> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| format!("{field} is not a valid URL: {e}"))
}

/// `MM/DD/YYYY`
fn us_date(field: &str, value: &str) -> Result<(), String> {
    let invalid = || format!("{field} must be a date in MM/DD/YYYY format");

    let parts: Vec<&str> = value.split('/').collect();
    let [month, day, year] = parts[..] else {
        return Err(invalid());
    };
    if month.len() != 2 || day.len() != 2 || year.len() != 4 {
        return Err(invalid());
    }

    let number = |s: &str| s.parse::<u32>().ok().filter(|_| s.bytes().all(|b| b.is_ascii_digit()));
    match (number(month), number(day), number(year)) {
        (Some(1..=12), Some(1..=31), Some(_)) => Ok(()),
        _ => Err(invalid()),
    }
}

fn optional_us_date(field: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    us_date(field, value)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn conference() -> serde_json::Value {
        json!({
            "id": "conference_1",
            "name": "RustConf",
            "url": "https://rustconf.com",
            "startDate": "09/10/2024",
            "endDate": "09/13/2024",
            "location": "Montreal",
            "cfpStartDate": "",
            "cfpEndDate": "04/01/2024",
            "cfpUrl": "https://rustconf.com/cfp",
            "proposedTalks": [{ "id": "talk_1", "status": "pending" }]
        })
    }

    fn conferences() -> Collection {
        collections().remove(1)
    }

    #[test]
    fn registers_talks_and_conferences() {
        let ids: Vec<String> = collections().iter().map(|c| c.id().to_owned()).collect();
        assert_eq!(ids, vec!["talks", "conferences"]);
    }

    #[test]
    fn talk_ids_are_prefixed() {
        assert!(collections()[0].generate_id().starts_with("talk_"));
    }

    #[test]
    fn valid_conference_passes() {
        let validated = conferences().validate(conference()).unwrap();
        assert_eq!(validated["proposedTalks"][0]["status"], "pending");
        assert!(validated.get("description").is_none());
    }

    #[test]
    fn talk_requires_all_fields() {
        let talks = collections().remove(0);
        let err = talks
            .validate(json!({ "id": "talk_1", "title": "Ownership" }))
            .unwrap_err();
        assert_eq!(err.collection, "talks");
    }

    #[test]
    fn talk_duration_is_numeric() {
        let talks = collections().remove(0);
        let talk = talks
            .validate(json!({
                "id": "talk_1",
                "title": "Ownership",
                "description": "Borrowing explained",
                "outline": "1. Moves",
                "idealDurationMinutes": 30
            }))
            .unwrap();
        assert_eq!(talk["idealDurationMinutes"], 30.0);
    }

    #[test]
    fn rejects_malformed_dates() {
        let mut value = conference();
        value["startDate"] = json!("2024-09-10");
        assert!(conferences().validate(value).is_err());

        let mut value = conference();
        value["endDate"] = json!("13/01/2024");
        assert!(conferences().validate(value).is_err());
    }

    #[test]
    fn rejects_invalid_urls() {
        let mut value = conference();
        value["cfpUrl"] = json!("not a url");
        assert!(conferences().validate(value).is_err());
    }

    #[test]
    fn rejects_blank_name() {
        let mut value = conference();
        value["name"] = json!("  ");
        assert!(conferences().validate(value).is_err());
    }

    #[test]
    fn rejects_unknown_proposal_status() {
        let mut value = conference();
        value["proposedTalks"] = json!([{ "id": "talk_1", "status": "maybe" }]);
        assert!(conferences().validate(value).is_err());
    }

    #[test]
    fn us_date_checks_ranges() {
        assert!(us_date("d", "02/29/2024").is_ok());
        assert!(us_date("d", "00/10/2024").is_err());
        assert!(us_date("d", "01/32/2024").is_err());
        assert!(us_date("d", "1/2/2024").is_err());
        assert!(us_date("d", "+1/02/2024").is_err());
    }
}
