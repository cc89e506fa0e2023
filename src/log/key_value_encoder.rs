//! log4rs encoder that appends structured `key=value` pairs after the usual
//! pattern output, so `info!(address = a; "...")` stays greppable on the
//! console and in files.

use std::io;

use log::{
    Record,
    kv::{Error, Key, Value, VisitSource},
};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::encode::{Color, Encode, Style, Write};
use serde::Deserialize;

const DEFAULT_PATTERN: &str = "{d} {l} {t} - {m}";

#[derive(Debug, Deserialize)]
pub struct KeyValueEncoderConfig {
    pub pattern: Option<String>,
    /// Colour the keys. Turn off for file appenders.
    #[serde(default = "default_colored")]
    pub colored: bool,
}

fn default_colored() -> bool {
    true
}

#[derive(Debug)]
pub struct KeyValueEncoder {
    delegate: PatternEncoder,
    colored: bool,
}

impl KeyValueEncoder {
    pub fn new(pattern: &str, colored: bool) -> Self {
        Self {
            delegate: PatternEncoder::new(pattern),
            colored,
        }
    }
}

impl Encode for KeyValueEncoder {
    fn encode(&self, w: &mut dyn Write, record: &Record) -> anyhow::Result<()> {
        self.delegate.encode(w, record)?;

        let mut visitor = PairWriter {
            writer: w,
            colored: self.colored,
            io_err: None,
        };

        if let Err(kv_err) = record.key_values().visit(&mut visitor) {
            if let Some(io_err) = visitor.io_err {
                return Err(io_err.into());
            }
            write!(w, " [kv error: {}]", kv_err)?;
        }

        w.write_all(b"\n")?;
        Ok(())
    }
}

struct PairWriter<'a> {
    writer: &'a mut dyn Write,
    colored: bool,
    io_err: Option<io::Error>,
}

impl PairWriter<'_> {
    fn write_pair(&mut self, key: &Key<'_>, value: &Value<'_>) -> io::Result<()> {
        if self.colored {
            self.writer.set_style(Style::new().text(Color::Cyan))?;
        }
        write!(self.writer, " {}=", key)?;
        if self.colored {
            self.writer.set_style(&Style::default())?;
        }

        let rendered = value.to_string();
        if rendered.is_empty() || rendered.contains(char::is_whitespace) {
            write!(self.writer, "{:?}", rendered)
        } else {
            write!(self.writer, "{}", rendered)
        }
    }
}

impl<'kvs> VisitSource<'kvs> for PairWriter<'_> {
    fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), Error> {
        if let Err(e) = self.write_pair(&key, &value) {
            self.io_err = Some(e);
            return Err(Error::msg("io error during visit"));
        }
        Ok(())
    }
}

pub struct KeyValueEncoderDeserializer;

impl log4rs::config::Deserialize for KeyValueEncoderDeserializer {
    type Trait = dyn Encode;
    type Config = KeyValueEncoderConfig;

    fn deserialize(
        &self,
        config: KeyValueEncoderConfig,
        _: &log4rs::config::Deserializers,
    ) -> anyhow::Result<Box<dyn Encode>> {
        let pattern = config.pattern.as_deref().unwrap_or(DEFAULT_PATTERN);
        Ok(Box::new(KeyValueEncoder::new(pattern, config.colored)))
    }
}
