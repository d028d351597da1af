//! Shared helpers for the behavioural tests.

use std::io::{Cursor, Write};

use zip::{ZipWriter, write::SimpleFileOptions};

/// Build a ZIP archive in memory.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap_or_else(|err| panic!("failed to start {name}: {err}"));
        writer
            .write_all(contents)
            .unwrap_or_else(|err| panic!("failed to write {name}: {err}"));
    }
    writer
        .finish()
        .unwrap_or_else(|err| panic!("failed to finish archive: {err}"))
        .into_inner()
}

/// Files of a small feed; `stop_times` replaces the default stop times rows.
pub fn feed_files(stop_times: &[&str]) -> Vec<(&'static str, String)> {
    vec![
        (
            "agency.txt",
            "agency_id,agency_name,agency_url,agency_timezone\n\
             A1,Metro,https://metro.example,Australia/Melbourne\n"
                .to_owned(),
        ),
        ("routes.txt", "route_id,agency_id,route_type\nR1,A1,0\n".to_owned()),
        ("trips.txt", "route_id,service_id,trip_id\nR1,WK,T1\n".to_owned()),
        (
            "calendar.txt",
            "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,\
             start_date,end_date\n\
             WK,1,1,1,1,1,0,0,20240101,20241231\n"
                .to_owned(),
        ),
        (
            "stops.txt",
            "stop_id,stop_name,stop_lat,stop_lon\n\
             S1,Flinders Street,-37.8183,144.9671\n\
             S2,Southern Cross,-37.8184,144.9525\n"
                .to_owned(),
        ),
        (
            "stop_times.txt",
            format!(
                "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n{}\n",
                stop_times.join("\n")
            ),
        ),
    ]
}

/// Stop times rows that load cleanly.
pub const GOOD_STOP_TIMES: [&str; 3] = [
    "T1,08:00:00,08:00:00,S1,1",
    "T1,08:05:00,08:05:00,S2,2",
    "T1,08:10:00,08:10:00,S1,3",
];

/// Archive holding the feed files at its top level.
pub fn feed_archive(stop_times: &[&str]) -> Vec<u8> {
    let files = feed_files(stop_times);
    let entries: Vec<(&str, &[u8])> = files
        .iter()
        .map(|(name, contents)| (*name, contents.as_bytes()))
        .collect();
    zip_bytes(&entries)
}
