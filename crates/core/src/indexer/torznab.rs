//! Jackett indexer backed by its Torznab XML endpoints.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::JackettConfig;
use crate::release::CandidateRelease;

use super::{category_code, Indexer, IndexerError};

/// Jackett search backend.
///
/// Queries every configured sub-indexer through its own Torznab endpoint.
pub struct JackettIndexer {
    client: Client,
    config: JackettConfig,
}

impl JackettIndexer {
    pub fn new(config: JackettConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn search_url(&self, sub_indexer: &str) -> String {
        format!(
            "{}/api/v2.0/indexers/{}/results/torznab/api",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(sub_indexer)
        )
    }

    /// Search a single sub-indexer.
    async fn search_sub_indexer(
        &self,
        sub_indexer: &str,
        query: &str,
        is_tv: bool,
    ) -> Result<Vec<CandidateRelease>, IndexerError> {
        let search_type = if is_tv { "tvsearch" } else { "movie" };
        debug!(indexer = sub_indexer, query = query, "Searching Jackett");

        let response = self
            .client
            .get(self.search_url(sub_indexer))
            .query(&[
                ("apikey", self.config.api_key.as_str()),
                ("t", search_type),
                ("q", query),
                ("cat", category_code(is_tv)),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexerError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = response.text().await?;
        let results = parse_torznab_feed(&body)?;

        info!(
            indexer = sub_indexer,
            query = query,
            results = results.len(),
            "Jackett search complete"
        );
        Ok(results)
    }
}

#[async_trait]
impl Indexer for JackettIndexer {
    fn name(&self) -> &str {
        "jackett"
    }

    async fn search(&self, query: &str, is_tv: bool) -> Result<Vec<CandidateRelease>, IndexerError> {
        let parallel = self.config.max_parallel_requests.max(1);

        let outcomes: Vec<(String, Result<Vec<CandidateRelease>, IndexerError>)> =
            stream::iter(self.config.indexers.iter().cloned())
                .map(|sub_indexer| async move {
                    let result = self.search_sub_indexer(&sub_indexer, query, is_tv).await;
                    (sub_indexer, result)
                })
                .buffer_unordered(parallel)
                .collect()
                .await;

        let mut candidates = Vec::new();
        let mut failures = Vec::new();

        for (sub_indexer, result) in outcomes {
            match result {
                Ok(mut found) => candidates.append(&mut found),
                Err(e) => {
                    warn!(indexer = %sub_indexer, error = %e, "Jackett sub-indexer search failed");
                    failures.push(format!("{}: {}", sub_indexer, e));
                }
            }
        }

        if !failures.is_empty() && failures.len() == self.config.indexers.len() {
            return Err(IndexerError::AllFailed(failures.join("; ")));
        }

        Ok(candidates)
    }
}

/// Item fields collected while walking the feed.
#[derive(Default)]
struct ItemBuilder {
    title: String,
    download_url: Option<String>,
    size: String,
    indexer: String,
    seeders: u32,
    download_volume_factor: f64,
    upload_volume_factor: f64,
}

impl ItemBuilder {
    fn new() -> Self {
        Self {
            download_volume_factor: 1.0,
            upload_volume_factor: 1.0,
            ..Default::default()
        }
    }

    fn set_attr(&mut self, name: &str, value: &str) {
        match name {
            "seeders" => self.seeders = value.trim().parse().unwrap_or(0),
            "downloadvolumefactor" => {
                self.download_volume_factor = value.trim().parse().unwrap_or(1.0)
            }
            "uploadvolumefactor" => self.upload_volume_factor = value.trim().parse().unwrap_or(1.0),
            "size" if self.size.is_empty() => self.size = value.to_string(),
            _ => {}
        }
    }

    fn flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        let dvf = self.download_volume_factor;
        if dvf == 0.0 {
            flags.push("freeleech");
        } else if dvf == 0.5 {
            flags.push("halfleech");
        } else if dvf == 0.75 {
            flags.push("freeleech75");
        } else if dvf == 0.25 {
            flags.push("freeleech25");
        }
        if self.upload_volume_factor == 2.0 {
            flags.push("doubleupload");
        }
        flags.into_iter().map(String::from).collect()
    }

    fn build(self) -> Option<CandidateRelease> {
        let title = self.title.trim();
        let url = self.download_url.as_deref()?;
        if title.is_empty() {
            return None;
        }

        let indexer = self.indexer.trim();
        let mut candidate = CandidateRelease::torrent(title, url, self.seeders)
            .with_size(self.size.trim().parse().unwrap_or(0))
            .with_flags(self.flags());
        if !indexer.is_empty() {
            candidate = candidate.with_indexer(indexer);
        }
        Some(candidate)
    }
}

fn attribute(element: &BytesStart, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// Parse a Torznab RSS feed into candidate releases.
///
/// Items without a title or an enclosure URL are skipped. Every item starts
/// from neutral volume factors and zero seeders.
pub fn parse_torznab_feed(xml: &str) -> Result<Vec<CandidateRelease>, IndexerError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut releases = Vec::new();
    let mut current: Option<ItemBuilder> = None;
    let mut current_tag = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "item" {
                    current = Some(ItemBuilder::new());
                } else if let Some(item) = current.as_mut() {
                    match tag.as_str() {
                        "torznab:attr" => {
                            if let (Some(name), Some(value)) =
                                (attribute(e, b"name"), attribute(e, b"value"))
                            {
                                item.set_attr(&name, &value);
                            }
                        }
                        "enclosure" => {
                            if let Some(url) = attribute(e, b"url") {
                                item.download_url = Some(url);
                            }
                        }
                        _ => {}
                    }
                }
                current_tag = tag;
            }
            Ok(Event::Text(ref e)) => {
                if let Some(item) = current.as_mut() {
                    let text = e.unescape().unwrap_or_default();
                    match current_tag.as_str() {
                        "title" => item.title.push_str(&text),
                        "size" => item.size = text.to_string(),
                        "jackettindexer" => item.indexer.push_str(&text),
                        _ => {}
                    }
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some(item) = current.as_mut() {
                    if current_tag == "title" {
                        let bytes: &[u8] = e;
                        item.title.push_str(&String::from_utf8_lossy(bytes));
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"item" {
                    if let Some(item) = current.take() {
                        match item.build() {
                            Some(release) => releases.push(release),
                            None => debug!("Skipping Torznab item without title or enclosure"),
                        }
                    }
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IndexerError::Parse(format!(
                    "XML error at position {}: {}",
                    reader.error_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(releases)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom" xmlns:torznab="http://torznab.com/schemas/2015/feed">
  <channel>
    <title>AggregateSearch</title>
    <item>
      <title>Show.Name.S02E05.1080p.WEB.x264</title>
      <guid>https://tracker.example/details/1</guid>
      <jackettindexer id="tracker">Tracker</jackettindexer>
      <size>1073741824</size>
      <enclosure url="http://jackett.local/dl/tracker/?path=abc" length="1073741824" type="application/x-bittorrent" />
      <torznab:attr name="seeders" value="42" />
      <torznab:attr name="peers" value="50" />
      <torznab:attr name="downloadvolumefactor" value="0" />
      <torznab:attr name="uploadvolumefactor" value="2" />
    </item>
    <item>
      <title><![CDATA[Show.Name.S02.720p & Extras]]></title>
      <size>2048</size>
      <enclosure url="magnet:?xt=urn:btih:abc" />
      <torznab:attr name="downloadvolumefactor" value="0.5" />
    </item>
    <item>
      <title>No enclosure</title>
      <size>1</size>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed_maps_attributes() {
        let releases = parse_torznab_feed(FEED).unwrap();
        assert_eq!(releases.len(), 2);

        let first = &releases[0];
        assert_eq!(first.title, "Show.Name.S02E05.1080p.WEB.x264");
        assert_eq!(first.download_url, "http://jackett.local/dl/tracker/?path=abc");
        assert_eq!(first.seeders, 42);
        assert_eq!(first.size_bytes, 1_073_741_824);
        assert_eq!(first.indexer.as_deref(), Some("Tracker"));
        assert_eq!(first.flags, vec!["freeleech", "doubleupload"]);
        assert!(!first.usenet);
        assert_eq!(first.age_secs, 0);
    }

    #[test]
    fn test_attributes_do_not_leak_between_items() {
        let releases = parse_torznab_feed(FEED).unwrap();
        let second = &releases[1];
        assert_eq!(second.title, "Show.Name.S02.720p & Extras");
        assert_eq!(second.seeders, 0);
        assert_eq!(second.flags, vec!["halfleech"]);
        assert_eq!(second.indexer, None);
    }

    #[test]
    fn test_volume_factor_flags() {
        let cases = [
            ("0.75", "1", vec!["freeleech75"]),
            ("0.25", "1", vec!["freeleech25"]),
            ("1", "1", vec![]),
            ("1", "2", vec!["doubleupload"]),
        ];
        for (dvf, uvf, expected) in cases {
            let mut item = ItemBuilder::new();
            item.set_attr("downloadvolumefactor", dvf);
            item.set_attr("uploadvolumefactor", uvf);
            assert_eq!(item.flags(), expected, "dvf={} uvf={}", dvf, uvf);
        }
    }

    #[test]
    fn test_malformed_feed_is_parse_error() {
        let err = parse_torznab_feed("<rss><channel><item></channel>").unwrap_err();
        assert!(matches!(err, IndexerError::Parse(_)));
    }

    #[test]
    fn test_search_url_encodes_sub_indexer() {
        let indexer = JackettIndexer::new(JackettConfig {
            enabled: true,
            url: "http://jackett.local:9117/".to_string(),
            api_key: "key".to_string(),
            indexers: vec!["all".to_string()],
            timeout_secs: 5,
            max_parallel_requests: 2,
        });
        assert_eq!(
            indexer.search_url("my tracker"),
            "http://jackett.local:9117/api/v2.0/indexers/my%20tracker/results/torznab/api"
        );
    }
}
