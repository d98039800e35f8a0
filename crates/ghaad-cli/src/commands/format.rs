use ghaad::{FileRevision, PullRequest, Repository};
use serde_json::Value;

const MAX_ID_WIDTH: usize = 45;
const LINE_BUDGET: usize = 90;

/// Fields shown next to an item's id, in order of preference.
const LABEL_FIELDS: [&str; 2] = ["title", "name"];

pub fn print_item_table(plural: &str, items: &[Value]) {
    if items.is_empty() {
        println!("No {} yet.", plural.to_lowercase());
        return;
    }

    let rows: Vec<(&str, &str)> = items
        .iter()
        .map(|item| (str_field(item, "id"), item_label(item)))
        .collect();

    print_rows(plural, &rows, MAX_ID_WIDTH);
}

pub fn print_pull_request_table(pull_requests: &[PullRequest]) {
    if pull_requests.is_empty() {
        println!("No open pull requests.");
        return;
    }

    let rows: Vec<(String, &str)> = pull_requests
        .iter()
        .map(|pr| (format!("#{}", pr.id), pr.title.as_str()))
        .collect();
    let rows: Vec<(&str, &str)> = rows.iter().map(|(id, t)| (id.as_str(), *t)).collect();

    print_rows("Pull requests", &rows, 8);
}

pub fn print_repository_table(repositories: &[Repository]) {
    if repositories.is_empty() {
        println!("No repositories found.");
        return;
    }

    let rows: Vec<(String, &str)> = repositories
        .iter()
        .map(|r| (format!("{}/{}", r.org, r.name), r.url.as_str()))
        .collect();
    let rows: Vec<(&str, &str)> = rows.iter().map(|(n, u)| (n.as_str(), *u)).collect();

    print_rows("Repositories", &rows, MAX_ID_WIDTH);
}

pub fn print_history(revisions: &[FileRevision]) {
    if revisions.is_empty() {
        println!("No commits touch this item.");
        return;
    }

    for revision in revisions {
        let short: String = revision.commit_id.chars().take(8).collect();
        let message = revision.message.lines().next().unwrap_or("");
        println!("{short}  {}  {}", revision.date, revision.author_name);
        println!("          {}", truncate(message, LINE_BUDGET - 10));
    }
}

fn print_rows(heading: &str, rows: &[(&str, &str)], max_key_width: usize) {
    let key_width = rows
        .iter()
        .map(|(k, _)| k.chars().count())
        .max()
        .unwrap_or(0)
        .min(max_key_width);

    let value_budget = LINE_BUDGET.saturating_sub(2 + key_width + 2);

    println!("{heading} ({})", rows.len());
    for (key, value) in rows {
        let key = truncate(key, key_width);
        let value = truncate(value, value_budget);
        println!("  {:<width$}  {}", key, value, width = key_width);
    }
}

fn item_label(item: &Value) -> &str {
    LABEL_FIELDS
        .iter()
        .find_map(|field| item.get(field).and_then(Value::as_str))
        .unwrap_or("")
}

fn str_field<'a>(item: &'a Value, field: &str) -> &'a str {
    item.get(field).and_then(Value::as_str).unwrap_or("")
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{truncated}…")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn truncate_short_string_unchanged() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn truncate_exact_length_unchanged() {
        assert_eq!(truncate("hello", 5), "hello");
    }

    #[test]
    fn truncate_long_string_adds_ellipsis() {
        assert_eq!(truncate("hello world", 6), "hello…");
    }

    #[test]
    fn truncate_handles_unicode() {
        assert_eq!(truncate("café latte", 5), "café…");
    }

    #[test]
    fn label_prefers_title_over_name() {
        let item = json!({ "id": "x", "title": "Ownership", "name": "ignored" });
        assert_eq!(item_label(&item), "Ownership");
    }

    #[test]
    fn label_falls_back_to_name() {
        let item = json!({ "id": "x", "name": "RustConf" });
        assert_eq!(item_label(&item), "RustConf");
    }

    #[test]
    fn label_is_empty_without_known_fields() {
        let item = json!({ "id": "x", "count": 3 });
        assert_eq!(item_label(&item), "");
    }
}
