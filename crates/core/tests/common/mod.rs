//! Shared helpers for tests that talk to fake HTTP backends.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake server");
    let addr = listener.local_addr().expect("Fake server has no address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{}", addr)
}

/// Ordered log of the requests a fake backend received.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, call: impl Into<String>) {
        self.0.lock().expect("call log poisoned").push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().expect("call log poisoned").clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }
}

/// A 40-character info-hash made of `c`.
pub fn hash_of(c: char) -> String {
    c.to_string().repeat(40)
}

/// Torznab feed with one torrent item per `(title, seeders, hash char)`.
pub fn torznab_feed(items: &[(&str, u32, char)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:torznab="http://torznab.com/schemas/2015/feed">
<channel>
"#,
    );
    for (title, seeders, hash) in items {
        xml.push_str(&format!(
            r#"<item>
  <title>{title}</title>
  <size>1073741824</size>
  <enclosure url="magnet:?xt=urn:btih:{hash}" type="application/x-bittorrent" />
  <torznab:attr name="seeders" value="{seeders}" />
</item>
"#,
            title = title,
            hash = hash_of(*hash),
            seeders = seeders
        ));
    }
    xml.push_str("</channel>\n</rss>\n");
    xml
}
