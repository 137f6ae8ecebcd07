use std::io::{self, Write};

use serde::Serialize;

use crate::app::{
    CrosswalkResult, FetchResult, FrameSummary, ListResult, LookupResult, ProgressEvent,
    ProgressSink, SetupResult,
};

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(result: &FetchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_list(result: &ListResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_setup(result: &SetupResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_crosswalk(result: &CrosswalkResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_lookup(result: &LookupResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_frame(summary: &FrameSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}
