use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::MessageFile;
use crate::core::task::Task;

pub const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Task</title>
    <style>
        body { font-family: Arial, sans-serif; }
        .task-title { font-size: 1.5em; color: #333; }
        .task-details { margin-top: 10px; }
        .completed { color: green; }
        .pending { color: red; }
    </style>
</head>
<body>
    <h1 class="task-title">{{TASK_TITLE}}</h1>
    <div class="task-details">
        <p><strong>User ID:</strong> {{USER_ID}}</p>
        <p><strong>Status:</strong> <span class="{{STATUS_CLASS}}">{{STATUS_TEXT}}</span></p>
        <p><strong>Details:</strong> {{TASK_DETAILS}}</p>
    </div>
</body>
</html>
"#;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Z_]+)\}\}").expect("placeholder pattern is valid"));

/// Subject line used both for the rendered message and for duplicate detection.
///
/// Whitespace runs (line breaks included) collapse to one space and the ends are
/// trimmed, so the value matches what a mail parser reads back from the header.
pub fn task_subject(task: &Task) -> String {
    let prefix = if task.is_completed() { "[DONE]" } else { "[TODO]" };
    let text = task.todo.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        prefix.to_string()
    } else {
        format!("{} {}", prefix, text)
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Fill the template placeholders for one task. Unknown placeholders are left as-is.
pub fn render_task_html(template: &str, task: &Task) -> String {
    let completed = task.is_completed();
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| match &caps[1] {
            "TASK_TITLE" => escape_html(&task.todo),
            "USER_ID" => task
                .user_id
                .map(|u| u.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            "STATUS_CLASS" => (if completed { "completed" } else { "pending" }).to_string(),
            "STATUS_TEXT" => (if completed { "Completed" } else { "Pending" }).to_string(),
            "TASK_DETAILS" => format!("Task ID: {}", escape_html(task.id.as_str())),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

/// Header block, blank line, HTML body.
pub fn format_raw_message(subject: &str, html_body: &str, from: &str, to: &str) -> String {
    let subject = subject.replace(['\r', '\n'], " ");
    let mut raw = format!(
        "From: {}\r\nTo: {}\r\nSubject: {}\r\nContent-Type: text/html; charset=utf-8\r\n\r\n",
        from, to, subject
    );
    for line in html_body.lines() {
        raw.push_str(line);
        raw.push_str("\r\n");
    }
    raw
}

/// The importable `task-{id}.eml` file for a task.
pub fn task_message_file(task: &Task, from: &str, to: &str) -> MessageFile {
    let subject = task_subject(task);
    let html = render_task_html(HTML_TEMPLATE, task);
    MessageFile {
        filename: format!("task-{}.eml", task.id),
        content: format_raw_message(&subject, &html, from, to).into_bytes(),
    }
}
