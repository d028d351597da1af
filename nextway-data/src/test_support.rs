//! Helpers shared by the unit tests of this crate.

use std::io::{Cursor, Write};

use camino::Utf8PathBuf;
use nextway_fs::WorkingStore;
use tempfile::TempDir;
use zip::{ZipWriter, write::SimpleFileOptions};

/// Build a ZIP archive in memory; names ending in `/` become directory markers.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer
                .add_directory(*name, SimpleFileOptions::default())
                .expect("add directory entry");
        } else {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .expect("start file entry");
            writer.write_all(contents).expect("write file entry");
        }
    }
    writer.finish().expect("finish archive").into_inner()
}

/// Working store under a temporary parent, so escapes can be checked for.
pub struct Sandbox {
    pub parent: TempDir,
    pub store: WorkingStore,
}

impl Sandbox {
    pub fn new() -> Self {
        let parent = tempfile::tempdir().expect("create temporary parent");
        let root = Utf8PathBuf::from_path_buf(parent.path().join("work")).expect("utf-8 path");
        let store = WorkingStore::open(&root).expect("open working store");
        Self { parent, store }
    }

    pub fn parent_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.parent.path().to_path_buf()).expect("utf-8 path")
    }

    pub fn files(&self) -> Vec<String> {
        self.store
            .files()
            .expect("list working store")
            .into_iter()
            .map(|entry| entry.path.into_string())
            .collect()
    }
}

/// Header line plus rows, joined with newlines.
pub fn table(header: &str, rows: &[&str]) -> Vec<u8> {
    let mut text = String::from(header);
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text.into_bytes()
}

/// Files of a small but complete feed.
pub fn minimal_feed() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        (
            "agency.txt",
            table(
                "agency_id,agency_name,agency_url,agency_timezone",
                &["A1,Metro,https://metro.example,Australia/Melbourne"],
            ),
        ),
        (
            "routes.txt",
            table(
                "route_id,agency_id,route_short_name,route_long_name,route_type",
                &["R1,A1,96,St Kilda Beach,0", "R2,A1,11,West Preston,0"],
            ),
        ),
        (
            "trips.txt",
            table(
                "route_id,service_id,trip_id,direction_id",
                &["R1,WK,T1,0", "R1,WK,T2,1", "R2,WE,T3,0"],
            ),
        ),
        (
            "stop_times.txt",
            table(
                "trip_id,arrival_time,departure_time,stop_id,stop_sequence",
                &[
                    "T1,08:00:00,08:00:00,S1,1",
                    "T1,08:05:00,08:05:30,S2,2",
                    "T2,09:00:00,09:00:00,S2,1",
                ],
            ),
        ),
        (
            "calendar.txt",
            table(
                "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,\
                 start_date,end_date",
                &[
                    "WK,1,1,1,1,1,0,0,20240101,20241231",
                    "WE,0,0,0,0,0,1,1,20240101,20241231",
                ],
            ),
        ),
        (
            "stops.txt",
            table(
                "stop_id,stop_code,stop_name,stop_lat,stop_lon",
                &[
                    "S1,1001,Flinders Street,-37.8183,144.9671",
                    "S2,1002,Southern Cross,-37.8184,144.9525",
                ],
            ),
        ),
    ]
}
