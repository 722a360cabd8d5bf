//! Plain-text email templates (Askama).
use crate::entity::{politician, statement};
use askama::Template;
use time::Date;
use time::macros::format_description;

/// Renders `items` as an English list: `a`, `a and b`, `a, b, and c`.
pub fn english_list<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [first, second] => format!("{} and {}", first.as_ref(), second.as_ref()),
        [init @ .., last] => {
            let head = init.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(", ");
            format!("{head}, and {}", last.as_ref())
        }
    }
}

pub fn format_hansard_date(date: Date) -> String {
    date.format(format_description!(
        "[month repr:long] [day padding:none], [year]"
    ))
    .unwrap_or_else(|_| date.to_string())
}

#[derive(Template)]
#[template(path = "politician_digest.txt")]
pub struct DigestEmailTemplate<'a> {
    pub politician: &'a politician::Model,
    pub statements: &'a [statement::Model],
    pub topics_list: String,
    pub hansard_date: String,
    pub hansard_url: String,
    pub alerts_url: String,
}

impl DigestEmailTemplate<'_> {
    #[tracing::instrument(skip(self), fields(politician_id = self.politician.id))]
    pub fn render_text(&self) -> Result<String, askama::Error> {
        self.render()
    }
}

#[derive(Template)]
#[template(path = "activate.txt")]
pub struct ActivationEmailTemplate<'a> {
    pub politician: &'a politician::Model,
    pub activate_url: String,
}

impl ActivationEmailTemplate<'_> {
    #[tracing::instrument(skip(self), fields(politician_id = self.politician.id))]
    pub fn render_text(&self) -> Result<String, askama::Error> {
        self.render()
    }
}
