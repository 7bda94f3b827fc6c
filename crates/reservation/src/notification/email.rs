//! Email rendering for booking notifications.

use super::{Notification, NotificationKind};

/// Subject and HTML body of a notification email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
}

/// Renders the confirmation or cancellation email for a notification.
pub fn render(notification: &Notification) -> EmailContent {
    let title = escape(&notification.slot.event_title);
    let name = escape(&notification.booking.requester.name);
    let when = notification
        .slot
        .slot
        .start_time
        .format("%Y-%m-%d %H:%M UTC");
    let booking_id = notification.booking.id;

    match notification.kind {
        NotificationKind::Created => EmailContent {
            subject: format!("Booking Confirmation - {}", notification.slot.event_title),
            html: format!(
                r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h2>Booking Confirmed!</h2>
    <p>Dear {name},</p>
    <p>Your booking has been successfully confirmed!</p>
    <div style="background-color: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0;">
        <h3>Booking Details:</h3>
        <p><strong>Event:</strong> {title}</p>
        <p><strong>Date &amp; Time:</strong> {when}</p>
        <p><strong>Booking ID:</strong> {booking_id}</p>
        <p><strong>Your Name:</strong> {name}</p>
    </div>
    <p>Please arrive a few minutes before your scheduled time.</p>
    <p>If you need to cancel or reschedule, please contact us as soon as possible.</p>
    <hr>
    <p style="color: #666; font-size: 12px;">
        This is an automated confirmation email. Please do not reply to this message.
    </p>
</body>
</html>
"#
            ),
        },
        NotificationKind::Cancelled => EmailContent {
            subject: format!("Booking Cancelled - {}", notification.slot.event_title),
            html: format!(
                r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h2>Booking Cancelled</h2>
    <p>Dear {name},</p>
    <p>Your booking has been cancelled.</p>
    <div style="background-color: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0;">
        <h3>Cancelled Booking Details:</h3>
        <p><strong>Event:</strong> {title}</p>
        <p><strong>Date &amp; Time:</strong> {when}</p>
        <p><strong>Booking ID:</strong> {booking_id}</p>
    </div>
    <p>If you have any questions, please contact us.</p>
    <hr>
    <p style="color: #666; font-size: 12px;">
        This is an automated email. Please do not reply to this message.
    </p>
</body>
</html>
"#
            ),
        },
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
