//! Multi-message bulk scan: find every `BUFR`-framed message in a byte
//! stream that may carry arbitrary inter-message padding, decoding each one
//! independently and resuming past any failure.

use log::{debug, warn};

use crate::message::{decode, Message, Resolver};
use crate::result::Error;

/// Scans `data` for `BUFR` markers, attempting a full decode from each one
/// found. Successes accumulate into the first return value; failures (with
/// the byte offset of their marker) accumulate into the second. Scanning
/// always reaches end-of-stream; a failed decode does not abort the scan.
pub fn scan_messages(data: &[u8], resolver: Resolver) -> (Vec<Message>, Vec<(usize, Error)>) {
    let mut messages = Vec::new();
    let mut errors = Vec::new();

    let mut i = 0;
    while i + 4 <= data.len() {
        if &data[i..i + 4] != b"BUFR" {
            i += 1;
            continue;
        }

        match resolver {
            Resolver::Table(table) => match decode(std::io::Cursor::new(&data[i..]), Resolver::Table(table)) {
                Ok(message) => {
                    debug!("decoded message at offset {i} ({} subsets)", message.subset_count());
                    messages.push(message);
                }
                Err(err) => {
                    warn!("failed to decode message at offset {i}: {err}");
                    errors.push((i, err));
                }
            },
            Resolver::Template(table, template) => {
                match decode(std::io::Cursor::new(&data[i..]), Resolver::Template(table, template)) {
                    Ok(message) => {
                        debug!("decoded message at offset {i} ({} subsets)", message.subset_count());
                        messages.push(message);
                    }
                    Err(err) => {
                        warn!("failed to decode message at offset {i}: {err}");
                        errors.push((i, err));
                    }
                }
            }
        }

        i += 4;
    }

    (messages, errors)
}
