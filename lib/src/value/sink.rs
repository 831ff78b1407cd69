use std::{fs, io};
use std::path::{Path, PathBuf};
use std::fmt::Debug;

use crate::error::{Result, Chainable};
use crate::value::Value;

pub trait Sink: Debug {
    fn write<V: Into<Value> + 'static>(&self, value: V) -> Result<()> {
        self.write_value(value.into())
    }

    fn write_value(&self, value: Value) -> Result<()>;
}

impl Sink for fs::File {
    fn write_value(&self, value: Value) -> Result<()> {
        fn write_value(to: &mut dyn io::Write, value: &Value) -> Result<()> {
            match value {
                Value::Null => Ok(()),
                Value::Array(array) => array.iter().try_for_each(|v| write_value(to, v)),
                Value::Dict(_) => Err("file endpoint does not support dictionary writes".into()),
                Value::Bytes(bytes) => Ok(to.write_all(bytes)?),
                scalar => Ok(to.write_all(scalar.to_string().as_bytes())?),
            }
        }

        let mut file = io::BufWriter::new(self);
        write_value(&mut file, &value)?;
        io::Write::flush(&mut file)?;
        Ok(())
    }
}

impl Sink for &Path {
    fn write_value(&self, value: Value) -> Result<()> {
        fs::File::create(self)
            .chain(error! {
                "failed to open/create file for writing",
                "file path" => self.display()
            })?
            .write_value(value)
    }
}

impl Sink for PathBuf {
    fn write_value(&self, value: Value) -> Result<()> {
        self.as_path().write_value(value)
    }
}

impl<T: Sink> Sink for &T {
    fn write_value(&self, value: Value) -> Result<()> {
        <T as Sink>::write_value(self, value)
    }
}
