// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pure template rendering.
//!
//! `render` maps a template kind and a record to a subject and an HTML
//! body. It reads nothing but its arguments, so the same record always
//! produces the same message.

use ccm_core::Record;
use serde::{Deserialize, Serialize};

/// Which notice to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    /// Ask the approval topic for sign-off.
    ApprovalRequest,
    /// Announce an approved record.
    ApprovedNotice,
    /// Announce a cancellation.
    CancellationNotice,
    /// Announce a completed change.
    CompletionNotice,
}

/// A rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html_body: String,
}

/// Render a notice for a record.
#[must_use]
pub fn render(kind: TemplateKind, record: &Record) -> RenderedEmail {
    let id = record.id().as_str();
    let title = record.title();
    let verb = match kind {
        TemplateKind::ApprovalRequest => "Approval requested",
        TemplateKind::ApprovedNotice => "Approved",
        TemplateKind::CancellationNotice => "Cancelled",
        TemplateKind::CompletionNotice => "Completed",
    };
    let subject = format!("{verb}: {title} ({id})");

    let mut body = String::new();
    body.push_str("<html><body>");
    body.push_str(&format!("<h2>{}</h2>", escape(title)));
    body.push_str(&format!("<p><strong>{id}</strong></p>"));

    match record {
        Record::Change(change) => {
            body.push_str(&format!("<p>{}</p>", escape(&change.description)));
            body.push_str(&format!(
                "<p>Window: {} &ndash; {}</p>",
                escape(&schedule_line(change.schedule.start_time, &change.schedule.timezone)),
                escape(&schedule_line(change.schedule.end_time, &change.schedule.timezone)),
            ));
            if kind == TemplateKind::ApprovalRequest {
                body.push_str(&format!(
                    "<p>Implementation plan:</p><p>{}</p>",
                    escape(&change.implementation_plan)
                ));
            }
        }
        Record::Announcement(announcement) => {
            body.push_str(&format!("<p>{}</p>", escape(&announcement.summary)));
            // Announcement content is authored HTML/markdown; passed through.
            body.push_str(&format!("<div>{}</div>", announcement.content));
        }
    }

    if kind == TemplateKind::ApprovedNotice {
        if let Some(url) = join_url(record) {
            body.push_str(&format!(
                "<p>Join the coordination meeting: <a href=\"{url}\">{url}</a></p>"
            ));
        }
    }
    body.push_str("</body></html>");

    RenderedEmail {
        subject,
        html_body: body,
    }
}

fn join_url(record: &Record) -> Option<&str> {
    match record {
        Record::Change(c) => c.join_url.as_deref(),
        Record::Announcement(a) => a.join_url.as_deref(),
    }
}

fn schedule_line(t: chrono::DateTime<chrono::Utc>, timezone: &str) -> String {
    match ccm_datetime::parse_timezone(timezone) {
        Ok(zone) => ccm_datetime::format_human(t, zone),
        // Validation catches bad zones before dispatch; fall back rather
        // than fail a render.
        Err(_) => ccm_datetime::format_rfc3339(t),
    }
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccm_core::{
        Announcement, AnnouncementType, Change, ModificationEntry, ModificationType, ObjectType,
        RecordId, Schedule, Status,
    };
    use chrono::{TimeZone, Utc};

    fn change() -> Record {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        Record::Change(Change {
            change_id: RecordId::parse("CHANGE-2025-001").unwrap(),
            object_type: ObjectType::Change,
            title: "Rotate certificates & keys".into(),
            description: "Annual rotation".into(),
            implementation_plan: "Region by region".into(),
            schedule: Schedule {
                start_time: Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).unwrap(),
                end_time: Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap(),
                timezone: "Europe/Berlin".into(),
            },
            affected_customers: ["hts".to_string()].into(),
            status: Status::Submitted,
            created_by: "op".into(),
            created_at: t0,
            meeting_required: true,
            meeting_id: None,
            join_url: None,
            modifications: vec![ModificationEntry::new(ModificationType::Created, "op", t0)],
        })
    }

    #[test]
    fn subjects_carry_verb_title_and_id() {
        let rendered = render(TemplateKind::ApprovalRequest, &change());
        assert_eq!(
            rendered.subject,
            "Approval requested: Rotate certificates & keys (CHANGE-2025-001)"
        );
    }

    #[test]
    fn change_body_shows_the_window_in_the_display_zone() {
        let rendered = render(TemplateKind::ApprovalRequest, &change());
        assert!(rendered.html_body.contains("February 1, 2025 at 9:00 AM Europe/Berlin"));
        assert!(rendered.html_body.contains("Region by region"));
    }

    #[test]
    fn titles_are_html_escaped() {
        let rendered = render(TemplateKind::ApprovedNotice, &change());
        assert!(rendered.html_body.contains("Rotate certificates &amp; keys"));
    }

    #[test]
    fn approved_notice_includes_join_url_when_present() {
        let Record::Change(mut c) = change() else {
            unreachable!()
        };
        c.join_url = Some("https://meet.example/m1".into());
        let record = Record::Change(c);

        let rendered = render(TemplateKind::ApprovedNotice, &record);
        assert!(rendered.html_body.contains("https://meet.example/m1"));

        let plain = render(TemplateKind::CancellationNotice, &record);
        assert!(!plain.html_body.contains("Join the coordination meeting"));
    }

    #[test]
    fn announcement_body_passes_content_through() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        let record = Record::Announcement(Announcement {
            announcement_id: RecordId::parse("FIN-2025-001").unwrap(),
            object_type: ObjectType::AnnouncementFinops,
            announcement_type: AnnouncementType::Finops,
            title: "Savings plans".into(),
            summary: "Renewal window".into(),
            content: "<p>Renew <em>now</em></p>".into(),
            customers: ["hts".to_string()].into(),
            status: Status::Submitted,
            include_meeting: false,
            meeting_id: None,
            join_url: None,
            attachments: vec![],
            created_by: "op".into(),
            created_at: t0,
            modifications: vec![ModificationEntry::new(ModificationType::Created, "op", t0)],
        });

        let rendered = render(TemplateKind::ApprovedNotice, &record);
        assert!(rendered.html_body.contains("<p>Renew <em>now</em></p>"));
        assert!(rendered.html_body.contains("Renewal window"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let record = change();
        assert_eq!(
            render(TemplateKind::ApprovalRequest, &record),
            render(TemplateKind::ApprovalRequest, &record)
        );
    }
}
