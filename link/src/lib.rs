pub mod link {
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;

    /// Outbound half of the companion-app link. Sends never block the caller for long
    /// and never fail loudly; a lost line is logged and forgotten.
    pub trait Link {
        fn send(&mut self, line: &str);
    }

    /// Newline-terminated lines over any byte sink (UART, stdout, socket).
    pub struct SerialLink<W: Write> {
        writer: W,
    }

    impl<W: Write> SerialLink<W> {
        pub fn new(writer: W) -> Self {
            SerialLink { writer }
        }
    }

    impl<W: Write> Link for SerialLink<W> {
        fn send(&mut self, line: &str) {
            let result = self
                .writer
                .write_all(line.as_bytes())
                .and_then(|_| self.writer.write_all(b"\n"))
                .and_then(|_| self.writer.flush());
            if let Err(e) = result {
                log::warn!("Link write failed: {:?}", e);
            }
        }
    }

    /// Keeps every sent line in memory. Clones share the same log.
    #[derive(Clone, Default)]
    pub struct MemoryLink {
        lines: Rc<RefCell<Vec<String>>>,
    }

    impl MemoryLink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn lines(&self) -> Vec<String> {
            self.lines.borrow().clone()
        }

        /// Lines sent since the last call.
        pub fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.lines.borrow_mut())
        }
    }

    impl Link for MemoryLink {
        fn send(&mut self, line: &str) {
            self.lines.borrow_mut().push(line.to_string());
        }
    }

    pub const MAX_LINE: usize = 127;

    pub type Line = heapless::String<MAX_LINE>;

    /// Frames an inbound byte stream into lines. `\r` is dropped, `\n` ends a line.
    /// Over-long or non UTF-8 lines are discarded whole.
    #[derive(Default)]
    pub struct LineAssembler {
        buf: heapless::Vec<u8, MAX_LINE>,
        overflowed: bool,
    }

    impl LineAssembler {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&mut self, byte: u8) -> Option<Line> {
            match byte {
                b'\r' => None,
                b'\n' => self.finish(),
                _ => {
                    if self.buf.push(byte).is_err() && !self.overflowed {
                        log::warn!("Inbound line longer than {} bytes, discarding", MAX_LINE);
                        self.overflowed = true;
                    }
                    None
                }
            }
        }

        pub fn extend<'a>(&'a mut self, bytes: &'a [u8]) -> impl Iterator<Item = Line> + 'a {
            bytes.iter().filter_map(move |b| self.push(*b))
        }

        fn finish(&mut self) -> Option<Line> {
            let overflowed = std::mem::take(&mut self.overflowed);
            let bytes = std::mem::take(&mut self.buf);
            if overflowed || bytes.is_empty() {
                return None;
            }
            match heapless::String::from_utf8(bytes) {
                Ok(line) => Some(line),
                Err(_) => {
                    log::warn!("Inbound line is not valid UTF-8, discarding");
                    None
                }
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn assembles_lines_across_chunks() {
            let mut framer = LineAssembler::new();
            assert_eq!(framer.extend(b"tra").count(), 0);
            let lines: Vec<Line> = framer.extend(b"ck|\r\ngetC|\n").collect();
            assert_eq!(lines.len(), 2);
            assert_eq!(lines[0].as_str(), "track|");
            assert_eq!(lines[1].as_str(), "getC|");
        }

        #[test]
        fn overlong_line_is_dropped_and_next_line_survives() {
            let mut framer = LineAssembler::new();
            let long = vec![b'x'; 200];
            assert_eq!(framer.extend(&long).count(), 0);
            assert!(framer.push(b'\n').is_none());
            let lines: Vec<Line> = framer.extend(b"stop|\n").collect();
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0].as_str(), "stop|");
        }

        #[test]
        fn blank_and_invalid_lines_are_skipped() {
            let mut framer = LineAssembler::new();
            assert_eq!(framer.extend(b"\r\n\n").count(), 0);
            assert_eq!(framer.extend(&[0xFF, 0xFE, b'\n']).count(), 0);
        }

        #[test]
        fn serial_link_terminates_lines() {
            let mut out = Vec::new();
            SerialLink::new(&mut out).send("Po|{}");
            assert_eq!(out, b"Po|{}\n");
        }

        #[test]
        fn memory_link_clones_share_lines() {
            let link = MemoryLink::new();
            let mut handle = link.clone();
            handle.send("Cf|{}");
            assert_eq!(link.lines(), vec!["Cf|{}".to_string()]);
            assert_eq!(link.take().len(), 1);
            assert!(link.lines().is_empty());
        }
    }
}

pub use link::{Line, LineAssembler, Link, MemoryLink, SerialLink, MAX_LINE};
