/* Positioned output sinks the emitter writes through. */

use std::fs::File;
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::path::Path;

/// A seekable byte sink with a printable location for diagnostics.
///
/// Forward seeks past the current end must be tolerated; the skipped
/// bytes have unspecified values (the emitter aligns by seeking, not by
/// writing padding).
pub trait OutputSink: Write + Seek
{
    fn location(&self) -> &str;
}

/// File-backed sink. Gaps left by forward seeks become holes until
/// overwritten or the file is closed.
pub struct FileSink
{
    file: File,
    location: String,
}

impl FileSink
{
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<FileSink>
    {
        let location = path.as_ref().display().to_string();
        let file = File::create(path)?;
        Ok(FileSink { file, location })
    }
}

impl Write for FileSink
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>
    {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()>
    {
        self.file.flush()
    }
}

impl Seek for FileSink
{
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>
    {
        self.file.seek(pos)
    }
}

impl OutputSink for FileSink
{
    fn location(&self) -> &str
    {
        &self.location
    }
}

/// In-memory sink. Forward seeks past the end zero-fill on the next
/// write, which makes emitted files byte-comparable in tests.
pub struct VecSink
{
    cursor: Cursor<Vec<u8>>,
    location: String,
}

impl VecSink
{
    pub fn new(location: &str) -> VecSink
    {
        VecSink {
            cursor: Cursor::new(Vec::new()),
            location: location.to_string(),
        }
    }

    pub fn bytes(&self) -> &[u8]
    {
        self.cursor.get_ref()
    }

    pub fn into_bytes(self) -> Vec<u8>
    {
        self.cursor.into_inner()
    }
}

impl Write for VecSink
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>
    {
        self.cursor.write(buf)
    }

    fn flush(&mut self) -> io::Result<()>
    {
        self.cursor.flush()
    }
}

impl Seek for VecSink
{
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>
    {
        self.cursor.seek(pos)
    }
}

impl OutputSink for VecSink
{
    fn location(&self) -> &str
    {
        &self.location
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn vec_sink_zero_fills_seek_gaps()
    {
        let mut sink = VecSink::new("test");
        sink.write_all(&[0xaa]).unwrap();
        let pos = sink.seek(SeekFrom::Current(3)).unwrap();
        assert_eq!(pos, 4);
        sink.write_all(&[0xbb]).unwrap();
        assert_eq!(sink.bytes(), &[0xaa, 0, 0, 0, 0xbb]);
    }

    #[test]
    fn vec_sink_reports_location()
    {
        let sink = VecSink::new("anonymous oat");
        assert_eq!(sink.location(), "anonymous oat");
    }
}
