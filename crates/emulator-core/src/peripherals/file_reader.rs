use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::api::{FromDeviceConfig, MmioDevice, MmioIdentity, MmioRange};
use crate::config::DeviceConfig;
use crate::fault::ConfigurationError;

/// Word offset that reads the next four bytes.
pub const READER_DATA_OFFSET: u32 = 0;
/// Word offset that reads 1 at end of stream, else 0.
pub const READER_EOF_OFFSET: u32 = 4;

/// Sequential byte source backed by a file.
///
/// Any write rewinds the stream to its start.
#[derive(Debug)]
pub struct FileReader {
    identity: MmioIdentity,
    path: PathBuf,
    source: BufReader<File>,
}

impl FileReader {
    /// Opens `path` for streaming.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::DeviceIo`] when the file cannot be opened.
    pub fn open(identity: MmioIdentity, path: &Path) -> Result<Self, ConfigurationError> {
        let file = File::open(path).map_err(|error| ConfigurationError::DeviceIo {
            name: identity.name.clone(),
            path: path.display().to_string(),
            reason: error.to_string(),
        })?;
        Ok(Self {
            identity,
            path: path.to_path_buf(),
            source: BufReader::new(file),
        })
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once every byte has been consumed.
    pub fn at_end(&mut self) -> bool {
        match self.source.fill_buf() {
            Ok(buffer) => buffer.is_empty(),
            Err(error) => {
                warn!(device = %self.identity.name, %error, "file reader failed");
                true
            }
        }
    }

    fn next_bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut bytes = [0u8; N];
        let mut filled = 0;
        while filled < N {
            match self.source.read(&mut bytes[filled..]) {
                Ok(0) => break,
                Ok(read) => filled += read,
                Err(error) => {
                    warn!(device = %self.identity.name, %error, "file reader failed");
                    break;
                }
            }
        }
        bytes
    }

    fn rewind(&mut self) {
        if let Err(error) = self.source.seek(SeekFrom::Start(0)) {
            warn!(device = %self.identity.name, %error, "file reader could not rewind");
        }
    }
}

impl FromDeviceConfig for FileReader {
    fn from_device_config(config: &DeviceConfig) -> Result<Self, ConfigurationError> {
        let path = config.required("path")?;
        Self::open(MmioIdentity::from(config), Path::new(path))
    }
}

impl MmioDevice for FileReader {
    fn name(&self) -> &str {
        &self.identity.name
    }

    fn range(&self) -> MmioRange {
        self.identity.range
    }

    fn read_byte(&mut self, _offset: u32) -> u8 {
        let [byte] = self.next_bytes::<1>();
        byte
    }

    fn read_integer(&mut self, offset: u32) -> u32 {
        if offset == READER_EOF_OFFSET {
            u32::from(self.at_end())
        } else {
            u32::from_be_bytes(self.next_bytes::<4>())
        }
    }

    fn write_byte(&mut self, _offset: u32, _value: u8) {
        self.rewind();
    }

    fn write_integer(&mut self, _offset: u32, _value: u32) {
        self.rewind();
    }

    fn reset(&mut self) {
        self.rewind();
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{FileReader, READER_DATA_OFFSET, READER_EOF_OFFSET};
    use crate::api::{FromDeviceConfig, MmioDevice, MmioIdentity};
    use crate::config::DeviceConfig;
    use crate::fault::ConfigurationError;

    fn reader_over(bytes: &[u8]) -> (tempfile::TempDir, FileReader) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("input.bin");
        fs::write(&path, bytes).expect("writable");
        let reader = FileReader::open(MmioIdentity::unmapped("in"), &path).expect("opens");
        (dir, reader)
    }

    #[test]
    fn streams_bytes_then_zero_at_end() {
        let (_dir, mut reader) = reader_over(&[7, 8]);
        assert_eq!(reader.read_byte(0), 7);
        assert_eq!(reader.read_integer(READER_EOF_OFFSET), 0);
        assert_eq!(reader.read_byte(0), 8);
        assert_eq!(reader.read_integer(READER_EOF_OFFSET), 1);
        assert_eq!(reader.read_byte(0), 0);
    }

    #[test]
    fn words_are_big_endian_and_zero_padded() {
        let (_dir, mut reader) = reader_over(&[0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(reader.read_integer(READER_DATA_OFFSET), 0x0102_0304);
        assert_eq!(reader.read_integer(READER_DATA_OFFSET), 0x0500_0000);
        assert!(reader.at_end());
    }

    #[test]
    fn writes_and_reset_rewind() {
        let (_dir, mut reader) = reader_over(&[9, 10]);
        reader.read_byte(0);
        reader.write_integer(0, 0);
        assert_eq!(reader.read_byte(0), 9);
        reader.read_byte(0);
        reader.reset();
        assert_eq!(reader.read_byte(0), 9);
    }

    #[test]
    fn path_is_required() {
        let config = DeviceConfig::parse("name=in address=0 range=8").expect("valid");
        assert!(matches!(
            FileReader::from_device_config(&config),
            Err(ConfigurationError::MissingKey { key: "path", .. })
        ));
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = DeviceConfig::parse(&format!(
            "name=in address=0 range=8 path={}",
            dir.path().join("absent.bin").display()
        ))
        .expect("valid");
        assert!(matches!(
            FileReader::from_device_config(&config),
            Err(ConfigurationError::DeviceIo { .. })
        ));
    }
}
