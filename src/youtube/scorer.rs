//! Video eligibility filtering and composite ranking.

use super::VideoMetadata;
use crate::config::YoutubeSettings;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// A video with its normalized sub-scores and weighted composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredVideo {
    #[serde(flatten)]
    pub video: VideoMetadata,
    pub score: f64,
    pub view_score: f64,
    pub recency_score: f64,
    pub relevance_score: f64,
}

/// Whole calendar months from `from` to `to`.
pub fn months_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64)
}

/// Score and rank `videos` against the current time.
pub fn score_and_select(
    videos: &[VideoMetadata],
    settings: &YoutubeSettings,
    language: &str,
    top_n: Option<usize>,
) -> Vec<ScoredVideo> {
    score_and_select_at(videos, settings, language, top_n, Utc::now())
}

/// Filter by duration, views and age, score the survivors, and keep the best `top_n`
/// (default `defaults.top_n_per_channel`).
///
/// View and relevance scores are normalized against the filtered batch, so a
/// score is only comparable with other videos from the same call.
pub fn score_and_select_at(
    videos: &[VideoMetadata],
    settings: &YoutubeSettings,
    language: &str,
    top_n: Option<usize>,
    now: DateTime<Utc>,
) -> Vec<ScoredVideo> {
    let defaults = &settings.defaults;
    let weights = &settings.scoring;
    let keywords: Vec<String> = settings
        .keywords_for(language)
        .iter()
        .map(|k| k.to_lowercase())
        .collect();
    let max_age = defaults.max_age_months.max(1) as f64;
    let top_n = top_n.unwrap_or(defaults.top_n_per_channel);

    let eligible: Vec<(&VideoMetadata, i64)> = videos
        .iter()
        .map(|video| (video, months_between(video.published_at, now)))
        .filter(|(video, age)| {
            video.duration_seconds >= defaults.min_duration_seconds
                && video.view_count >= defaults.min_views
                && *age <= defaults.max_age_months as i64
        })
        .collect();

    if eligible.is_empty() {
        return Vec::new();
    }

    let matches: Vec<usize> = eligible
        .iter()
        .map(|(video, _)| count_keyword_matches(video, &keywords))
        .collect();
    let max_views = eligible.iter().map(|(v, _)| v.view_count).max().unwrap_or(0);
    let max_matches = matches.iter().copied().max().unwrap_or(0).max(1);

    let mut scored: Vec<ScoredVideo> = eligible
        .into_iter()
        .zip(matches)
        .map(|((video, age), keyword_matches)| {
            let view_score = if max_views > 0 {
                ((video.view_count as f64 + 1.0).log10() / (max_views as f64 + 1.0).log10())
                    .clamp(0.0, 1.0)
            } else {
                0.0
            };
            // Future-dated uploads count as brand new.
            let recency_score = (1.0 - age.max(0) as f64 / max_age).clamp(0.0, 1.0);
            let relevance_score = keyword_matches as f64 / max_matches as f64;

            let score = weights.view_weight * view_score
                + weights.recency_weight * recency_score
                + weights.relevance_weight * relevance_score;

            ScoredVideo {
                video: video.clone(),
                score,
                view_score,
                recency_score,
                relevance_score,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_n);
    scored
}

/// Count keywords appearing anywhere in title, description, or tags.
fn count_keyword_matches(video: &VideoMetadata, keywords: &[String]) -> usize {
    let haystack = format!(
        "{} {} {}",
        video.title,
        video.description,
        video.tags.join(" ")
    )
    .to_lowercase();

    keywords.iter().filter(|k| haystack.contains(k.as_str())).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn settings() -> YoutubeSettings {
        let mut settings = YoutubeSettings::default();
        settings.keywords = HashMap::from([(
            "en".to_string(),
            vec!["pricing".to_string(), "offer".to_string(), "Funnel".to_string()],
        )]);
        settings
    }

    fn video(id: &str, views: u64, months_old: u32, duration: u64, title: &str) -> VideoMetadata {
        let published_at = now()
            .checked_sub_months(chrono::Months::new(months_old))
            .unwrap();
        VideoMetadata {
            video_id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            channel_id: "UC1".to_string(),
            channel_title: "Channel".to_string(),
            published_at,
            view_count: views,
            like_count: 0,
            duration: String::new(),
            duration_seconds: duration,
            thumbnail_url: String::new(),
            tags: Vec::new(),
            video_url: crate::youtube::video_url(id),
        }
    }

    #[test]
    fn test_months_between() {
        let from = Utc.with_ymd_and_hms(2024, 11, 30, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(months_between(from, to), 2);
        assert_eq!(months_between(to, to), 0);
    }

    #[test]
    fn test_filters_ineligible_videos() {
        let videos = vec![
            video("short", 50_000, 1, 60, "pricing short"),
            video("few-views", 10, 1, 600, "pricing"),
            video("ancient", 50_000, 40, 600, "pricing"),
            video("ok", 50_000, 1, 600, "pricing"),
        ];
        let selected = score_and_select_at(&videos, &settings(), "en", None, now());

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].video.video_id, "ok");
    }

    #[test]
    fn test_age_at_cutoff_is_eligible_with_zero_recency() {
        let videos = vec![video("edge", 5_000, 36, 600, "")];
        let selected = score_and_select_at(&videos, &settings(), "en", None, now());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].recency_score, 0.0);
    }

    #[test]
    fn test_empty_filtered_set() {
        let videos = vec![video("short", 50_000, 1, 10, "")];
        assert!(score_and_select_at(&videos, &settings(), "en", None, now()).is_empty());
        assert!(score_and_select_at(&[], &settings(), "en", None, now()).is_empty());
    }

    #[test]
    fn test_sub_scores() {
        let mut tagged = video("b", 9_999, 18, 600, "An offer");
        tagged.tags = vec!["FUNNEL".to_string()];
        let videos = vec![video("a", 999_999, 0, 600, "Pricing and offer funnels"), tagged];
        let selected = score_and_select_at(&videos, &settings(), "en", None, now());

        let a = selected.iter().find(|s| s.video.video_id == "a").unwrap();
        let b = selected.iter().find(|s| s.video.video_id == "b").unwrap();

        assert!((a.view_score - 1.0).abs() < 1e-9);
        assert!((b.view_score - 4.0 / 6.0).abs() < 1e-9);
        assert_eq!(a.recency_score, 1.0);
        assert!((b.recency_score - 0.5).abs() < 1e-9);
        assert_eq!(a.relevance_score, 1.0);
        assert!((b.relevance_score - 2.0 / 3.0).abs() < 1e-9);

        let expected = 0.4 * b.view_score + 0.3 * b.recency_score + 0.3 * b.relevance_score;
        assert!((b.score - expected).abs() < 1e-9);
        assert_eq!(selected[0].video.video_id, "a");
    }

    #[test]
    fn test_no_keyword_matches_gives_zero_relevance() {
        let videos = vec![video("a", 5_000, 1, 600, "nothing relevant")];
        let selected = score_and_select_at(&videos, &settings(), "xx", None, now());
        assert_eq!(selected[0].relevance_score, 0.0);
    }

    #[test]
    fn test_top_n_and_ordering() {
        let videos: Vec<VideoMetadata> = (0..15)
            .map(|i| video(&format!("v{}", i), 1_000 + i * 1_000, 2, 600, "pricing"))
            .collect();

        let selected = score_and_select_at(&videos, &settings(), "en", None, now());
        assert_eq!(selected.len(), 10);
        assert!(selected.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(selected[0].video.video_id, "v14");

        let top3 = score_and_select_at(&videos, &settings(), "en", Some(3), now());
        assert_eq!(top3.len(), 3);
    }

    #[test]
    fn test_deterministic() {
        let videos: Vec<VideoMetadata> = (0..8)
            .map(|i| video(&format!("v{}", i), 2_000 * (i % 3 + 1), i as u32, 600, "offer"))
            .collect();
        let first = score_and_select_at(&videos, &settings(), "en", None, now());
        let second = score_and_select_at(&videos, &settings(), "en", None, now());
        assert_eq!(first, second);
    }
}
