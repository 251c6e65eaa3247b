use std::fmt;
use std::fs::File;
use std::io::{self, Write};

use tracing::warn;

use crate::api::{FromDeviceConfig, MmioDevice, MmioIdentity, MmioRange};
use crate::config::DeviceConfig;
use crate::fault::ConfigurationError;

/// Output sink. Word writes print `binary\tHEX8\tdecimal` lines; byte writes
/// emit the raw byte. Reads return zero.
///
/// Sink failures are logged and counted; the core never sees them.
pub struct FileWriter {
    identity: MmioIdentity,
    sink: Box<dyn Write>,
    failures: u64,
}

impl FileWriter {
    /// Creates a writer over an arbitrary sink.
    #[must_use]
    pub fn new(identity: MmioIdentity, sink: Box<dyn Write>) -> Self {
        Self {
            identity,
            sink,
            failures: 0,
        }
    }

    /// Number of writes the sink rejected.
    #[must_use]
    pub const fn failures(&self) -> u64 {
        self.failures
    }

    fn emit(&mut self, bytes: &[u8]) {
        if let Err(error) = self
            .sink
            .write_all(bytes)
            .and_then(|()| self.sink.flush())
        {
            self.failures += 1;
            warn!(device = %self.identity.name, %error, "file writer sink failed");
        }
    }
}

/// Formats a word the way the writer prints it.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn format_word(value: u32) -> String {
    format!("{value:b}\t{value:08X}\t{}\n", value as i32)
}

impl fmt::Debug for FileWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileWriter")
            .field("identity", &self.identity)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

impl FromDeviceConfig for FileWriter {
    fn from_device_config(config: &DeviceConfig) -> Result<Self, ConfigurationError> {
        let identity = MmioIdentity::from(config);
        let sink: Box<dyn Write> = match config.get("path") {
            Some(path) => Box::new(File::create(path).map_err(|error| {
                ConfigurationError::DeviceIo {
                    name: identity.name.clone(),
                    path: path.to_owned(),
                    reason: error.to_string(),
                }
            })?),
            None => Box::new(io::stdout()),
        };
        Ok(Self::new(identity, sink))
    }
}

impl MmioDevice for FileWriter {
    fn name(&self) -> &str {
        &self.identity.name
    }

    fn range(&self) -> MmioRange {
        self.identity.range
    }

    fn read_byte(&mut self, _offset: u32) -> u8 {
        0
    }

    fn read_integer(&mut self, _offset: u32) -> u32 {
        0
    }

    fn write_byte(&mut self, _offset: u32, value: u8) {
        self.emit(&[value]);
    }

    fn write_integer(&mut self, _offset: u32, value: u32) {
        self.emit(format_word(value).as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::{self, Write};

    use super::{format_word, FileWriter};
    use crate::api::{FromDeviceConfig, MmioDevice, MmioIdentity};
    use crate::config::DeviceConfig;
    use crate::fault::ConfigurationError;

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn word_lines_show_binary_hex_and_signed_decimal() {
        assert_eq!(format_word(5), "101\t00000005\t5\n");
        assert_eq!(
            format_word(u32::MAX),
            "11111111111111111111111111111111\tFFFFFFFF\t-1\n"
        );
    }

    #[test]
    fn writes_land_in_configured_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.txt");
        let config = DeviceConfig::parse(&format!(
            "name=out address=0x9100 range=4 path={}",
            path.display()
        ))
        .expect("valid config");
        let mut writer = FileWriter::from_device_config(&config).expect("file opens");
        writer.write_integer(0, 10);
        writer.write_byte(0, b'!');
        assert_eq!(writer.read_integer(0), 0);
        drop(writer);

        let written = fs::read_to_string(&path).expect("readable");
        assert_eq!(written, "1010\t0000000A\t10\n!");
    }

    #[test]
    fn unopenable_path_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("out.txt");
        let config = DeviceConfig::parse(&format!(
            "name=out address=0 range=4 path={}",
            path.display()
        ))
        .expect("valid config");
        assert!(matches!(
            FileWriter::from_device_config(&config),
            Err(ConfigurationError::DeviceIo { .. })
        ));
    }

    #[test]
    fn sink_failures_are_counted_not_propagated() {
        let mut writer = FileWriter::new(MmioIdentity::unmapped("out"), Box::new(Broken));
        writer.write_integer(0, 1);
        writer.write_byte(0, 1);
        assert_eq!(writer.failures(), 2);
    }
}
