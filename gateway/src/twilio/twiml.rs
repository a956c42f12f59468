//! Minimal TwiML builder for the verbs the bridge emits.

use std::fmt::Write;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// SIP endpoint dialed by a `<Dial>` verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipTarget {
    pub uri: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Verb {
    Say(String),
    DialSip(SipTarget),
    Hangup,
}

/// A `<Response>` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    /// `<Dial><Sip>` to the given target.
    pub fn dial_sip(mut self, target: SipTarget) -> Self {
        self.verbs.push(Verb::DialSip(target));
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from(XML_DECLARATION);
        xml.push_str("<Response>");
        for verb in &self.verbs {
            match verb {
                Verb::Say(text) => {
                    let _ = write!(xml, "<Say>{}</Say>", escape(text));
                }
                Verb::DialSip(target) => {
                    xml.push_str("<Dial><Sip");
                    if let Some(username) = &target.username {
                        let _ = write!(xml, r#" username="{}""#, escape(username));
                    }
                    if let Some(password) = &target.password {
                        let _ = write!(xml, r#" password="{}""#, escape(password));
                    }
                    let _ = write!(xml, ">{}</Sip></Dial>", escape(&target.uri));
                }
                Verb::Hangup => xml.push_str("<Hangup/>"),
            }
        }
        xml.push_str("</Response>");
        xml
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
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
