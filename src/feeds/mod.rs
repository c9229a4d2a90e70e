//! The `feeds` module holds the static catalog of feeds the endpoint offers
//! and the selection of feeds for the current run.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

/// Wire format of a feed's notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedFormat {
    RawJson,
    RawXml,
    /// Decompressed by the transport; decodes like [`FeedFormat::RawJson`].
    GzippedJson,
}

impl fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FeedFormat::RawJson => "json",
            FeedFormat::RawXml => "xml",
            FeedFormat::GzippedJson => "json+gzip",
        };
        f.write_str(s)
    }
}

/// One entry of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feed {
    pub name: &'static str,
    pub target: &'static str,
    pub format: FeedFormat,
}

/// Every feed the endpoint is known to publish.
pub static CATALOG: [Feed; 3] = [
    Feed {
        name: "AsterixJSON",
        target: "feed_json",
        format: FeedFormat::RawJson,
    },
    Feed {
        name: "AsterixXML",
        target: "feed_xml",
        format: FeedFormat::RawXml,
    },
    Feed {
        name: "AsterixJSONgzipped",
        target: "feed_jsongz",
        format: FeedFormat::GzippedJson,
    },
];

/// Looks a feed up by name.
pub fn lookup(name: &str) -> Option<&'static Feed> {
    CATALOG.iter().find(|f| f.name == name)
}

/// Catalog feed names, for usage messages.
pub fn names() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|f| f.name)
}

/// Feeds selected for this invocation, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunningFeeds {
    feeds: BTreeMap<&'static str, &'static Feed>,
}

impl RunningFeeds {
    /// Keeps the catalog feeds named in `args`. Unknown names are dropped
    /// with a warning; duplicates collapse.
    pub fn select<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut feeds = BTreeMap::new();
        for arg in args {
            let arg = arg.as_ref();
            match lookup(arg) {
                Some(feed) => {
                    debug!("Configuring {} for {}", feed.target, feed.name);
                    feeds.insert(feed.name, feed);
                }
                None => warn!("Ignoring unknown feed {arg}"),
            }
        }
        Self { feeds }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static Feed> + '_ {
        self.feeds.values().copied()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.feeds.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}
