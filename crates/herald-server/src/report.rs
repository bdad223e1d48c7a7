//! Human-readable summaries of fan-out results.

use std::fmt::Write;

use herald_store::Post;

use crate::fanout::{FanOutReport, Outcome, RepostReport, RetractReport};

fn outcome_lines(report: &FanOutReport, delivered_heading: &str, failed_heading: &str) -> String {
    let mut text = String::new();

    let mut delivered = report.delivered().peekable();
    if delivered.peek().is_some() {
        let _ = writeln!(text, "{delivered_heading}");
        for outcome in delivered {
            if let Outcome::Delivered { chat, link, .. } = outcome {
                match link {
                    Some(link) => {
                        let _ = writeln!(text, "- <code>{chat}</code> (<a href='{link}'>View</a>)");
                    }
                    None => {
                        let _ = writeln!(text, "- <code>{chat}</code>");
                    }
                }
            }
        }
        text.push('\n');
    }

    let mut failed = report.failed().peekable();
    if failed.peek().is_some() {
        let _ = writeln!(text, "{failed_heading}");
        for outcome in failed {
            let _ = writeln!(text, "- <code>{}</code>", outcome.chat());
        }
        text.push('\n');
    }

    text
}

fn retraction_hint(report: &FanOutReport) -> String {
    format!(
        "New post id: <code>{id}</code>\nTo take it down, delete post <code>{id}</code>.",
        id = report.post_id
    )
}

pub fn distribute_summary(report: &FanOutReport) -> String {
    let mut text = outcome_lines(
        report,
        "Sent to the following chats:",
        "Failed to send to the following chats:",
    );
    if report.outcomes.is_empty() {
        text.push_str("No destinations were attempted.\n\n");
    }
    text.push_str(&retraction_hint(report));
    text
}

pub fn draft_summary(post: &Post) -> String {
    format!(
        "Draft saved.\nPost id: <code>{id}</code>\nSend it to every connected chat with post <code>{id}</code>.",
        id = post.id
    )
}

pub fn retract_summary(report: &RetractReport) -> String {
    let mut text = format!(
        "Post <code>{}</code> deleted from {} chat(s).",
        report.post_id, report.deleted
    );
    if !report.already_gone.is_empty() {
        let _ = write!(
            text,
            "\n{} copy(ies) were already gone.",
            report.already_gone.len()
        );
    }
    if !report.failed.is_empty() {
        text.push_str("\nCould not delete from:\n");
        for chat in &report.failed {
            let _ = writeln!(text, "- <code>{chat}</code>");
        }
    }
    text
}

pub fn repost_summary(report: &RepostReport) -> String {
    format!(
        "Old post deleted from {} chat(s).\n\n{}",
        report.retracted.deleted,
        distribute_summary(&report.distributed)
    )
}

pub fn edit_summary(report: &FanOutReport) -> String {
    let mut text = outcome_lines(
        report,
        "Edited in the following chats:",
        "Failed to edit in the following chats:",
    );
    text.push_str(&retraction_hint(report));
    text
}
