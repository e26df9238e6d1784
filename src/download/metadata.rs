use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ytdlp::RemoteInfo;

/// Metadata record written next to each download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaMetadata {
    pub title: Option<String>,
    pub channel: Option<String>,
    pub views: String,
    pub likes: String,
    #[serde(rename = "Upload Date")]
    pub upload_date: String,
    pub duration: String,
    #[serde(rename = "URL")]
    pub url: Option<String>,
}

impl MediaMetadata {
    pub fn from_info(info: &RemoteInfo) -> Self {
        Self {
            title: info.title.clone(),
            channel: info.uploader.clone(),
            views: format_count(info.view_count.unwrap_or(0)),
            likes: format_count(info.like_count.unwrap_or(0)),
            upload_date: format_upload_date(info.upload_date.as_deref()),
            duration: format_duration_words(info.duration.unwrap_or(0.0)),
            url: info.webpage_url.clone(),
        }
    }

    /// Label/value pairs in display order
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let or_unknown = |value: &Option<String>| value.clone().unwrap_or_else(|| "unknown".to_string());
        vec![
            ("Title", or_unknown(&self.title)),
            ("Channel", or_unknown(&self.channel)),
            ("Views", self.views.clone()),
            ("Likes", self.likes.clone()),
            ("Upload Date", self.upload_date.clone()),
            ("Duration", self.duration.clone()),
            ("URL", or_unknown(&self.url)),
        ]
    }
}

/// Group digits in threes with `.`: 1234567 -> 1.234.567
pub fn format_count(number: u64) -> String {
    let digits = number.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    grouped
}

/// `YYYYMMDD` -> `DD-MM-YYYY`
pub fn format_upload_date(raw: Option<&str>) -> String {
    raw.and_then(|date| NaiveDate::parse_from_str(date, "%Y%m%d").ok())
        .map(|date| date.format("%d-%m-%Y").to_string())
        .unwrap_or_else(|| "unknown date".to_string())
}

/// Whole seconds as `X minutes and Y seconds`
pub fn format_duration_words(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds as u64 } else { 0 };
    format!("{} minutes and {} seconds", total / 60, total % 60)
}
