//! WPNS toast payload rendering.

use herald_common::types::Notification;

/// Headers sent with every toast request.
pub const TOAST_HEADERS: [(&str, &str); 3] = [
    ("Content-Type", "text/xml"),
    ("X-WindowsPhone-Target", "toast"),
    // 2 = deliver immediately
    ("X-NotificationClass", "2"),
];

/// A serialized request body plus the provider headers that go with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl OutboundRequest {
    pub fn toast(notification: &Notification) -> Self {
        Self {
            headers: TOAST_HEADERS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: toast_xml(&notification.alert),
        }
    }
}

pub fn toast_xml(alert: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<wp:Notification xmlns:wp="WPNotification">"#,
            "<wp:Toast><wp:Text1>{}</wp:Text1></wp:Toast>",
            "</wp:Notification>"
        ),
        escape_xml(alert)
    )
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_common::types::App;

    #[test]
    fn test_toast_body() {
        let app = App::new("MyApp");
        let n = Notification::new(&app, "test", "http://some.example/");
        let req = OutboundRequest::toast(&n);
        assert_eq!(
            req.body,
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><wp:Notification xmlns:wp=\"WPNotification\"><wp:Toast><wp:Text1>test</wp:Text1></wp:Toast></wp:Notification>"
        );
        assert!(
            req.headers
                .contains(&("X-WindowsPhone-Target".to_string(), "toast".to_string()))
        );
    }

    #[test]
    fn test_alert_is_escaped() {
        let xml = toast_xml(r#"Tom & "Jerry" <3 'em"#);
        assert!(xml.contains("Tom &amp; &quot;Jerry&quot; &lt;3 &apos;em"));
    }
}
