//! Test helpers that lay out feed directories on disk.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

const FEED: [(&str, &str); 6] = [
    (
        "agency.txt",
        "agency_id,agency_name,agency_url,agency_timezone\n\
         A1,Metro,https://metro.example,Australia/Melbourne\n",
    ),
    ("routes.txt", "route_id,agency_id,route_type\nR1,A1,0\n"),
    ("trips.txt", "route_id,service_id,trip_id\nR1,WK,T1\n"),
    (
        "stop_times.txt",
        "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
         T1,08:00:00,08:00:00,S1,1\n\
         T1,08:04:00,08:04:00,S2,2\n",
    ),
    (
        "calendar.txt",
        "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,\
         start_date,end_date\n\
         WK,1,1,1,1,1,0,0,20240101,20241231\n",
    ),
    (
        "stops.txt",
        "stop_id,stop_name\nS1,Flinders Street\nS2,Southern Cross\n",
    ),
];

/// Temporary workspace holding a feed directory and room for stores.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    /// Write the sample feed into `name`, leaving out `omit`.
    pub(super) fn write_feed(&self, name: &str, omit: Option<&str>) -> Utf8PathBuf {
        let feed = self.path(name);
        fs::create_dir_all(&feed).expect("create feed directory");
        for (file, contents) in FEED {
            if Some(file) != omit {
                write_utf8(&feed.join(file), contents.as_bytes());
            }
        }
        feed
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace").field("root", &self.root).finish()
    }
}

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    fs::write(path, contents).expect("write file");
}
