// Archivo: file.rs
// Propósito: lectura y escritura de ficheros de texto delimitado (sin
// cabecera, separador `,`) como origen y destino de chunks.
use crate::errors::{BatchError, ParseError, Result};
use crate::item::{ItemReader, ItemWriter};
use csv::{ByteRecord, ReaderBuilder, Trim, WriterBuilder};
use log::debug;
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Registro delimitado con acceso por nombre de campo.
#[derive(Debug, Clone)]
pub struct FieldSet {
    names: Arc<[String]>,
    values: Vec<String>,
    line: u64,
    raw: String,
}

impl FieldSet {
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Línea original, sin el salto de línea final.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|idx| self.values.get(idx))
            .map(|s| s.as_str())
    }

    /// Campo obligatorio; su ausencia es un registro mal formado.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name).ok_or_else(|| self.error(format!("falta el campo '{}'", name)))
    }

    /// Convierte un campo con `FromStr`.
    pub fn parse<T>(&self, name: &str) -> Result<T>
        where T: FromStr,
              T::Err: Display
    {
        let value = self.require(name)?;
        value.parse::<T>()
             .map_err(|e| self.error(format!("campo '{}' = '{}': {}", name, value, e)))
    }

    /// Error de parseo ligado a este registro.
    pub fn error(&self, cause: impl Into<String>) -> BatchError {
        BatchError::Parse(ParseError { line: self.line, raw: self.raw.clone(), cause: cause.into() })
    }
}

type Mapper<T> = Box<dyn Fn(&FieldSet) -> Result<T> + Send>;

enum Source {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// Origen de items a partir de un fichero delimitado.
///
/// Cada línea física es un registro: se divide en campos posicionales, se
/// nombran con `names` y se entregan al `mapper`. Las líneas vacías se
/// saltan. Un número de campos distinto del esperado, UTF-8 inválido o un
/// error del mapper se reportan como `ParseError` con la línea (1-based) y
/// su texto original.
pub struct FlatFileItemReader<T> {
    source: Source,
    names: Arc<[String]>,
    mapper: Mapper<T>,
    reader: Option<Box<dyn BufRead + Send>>,
    buf: Vec<u8>,
    line: u64,
}

impl<T> FlatFileItemReader<T> {
    pub fn from_path<P, F>(path: P, names: &[&str], mapper: F) -> Self
        where P: AsRef<Path>,
              F: Fn(&FieldSet) -> Result<T> + Send + 'static
    {
        Self::with_source(Source::Path(path.as_ref().to_path_buf()), names, Box::new(mapper))
    }

    pub fn from_bytes<B, F>(bytes: B, names: &[&str], mapper: F) -> Self
        where B: Into<Vec<u8>>,
              F: Fn(&FieldSet) -> Result<T> + Send + 'static
    {
        Self::with_source(Source::Bytes(bytes.into()), names, Box::new(mapper))
    }

    fn with_source(source: Source, names: &[&str], mapper: Mapper<T>) -> Self {
        Self { source,
               names: names.iter().map(|n| n.to_string()).collect(),
               mapper,
               reader: None,
               buf: Vec::new(),
               line: 0 }
    }

    /// Siguiente línea no vacía en `buf`, sin `\n` ni `\r` finales.
    fn next_line(&mut self) -> Result<bool> {
        let reader = self.reader
                         .as_mut()
                         .ok_or_else(|| BatchError::Read("el fichero no está abierto".into()))?;
        loop {
            self.buf.clear();
            let n = reader.read_until(b'\n', &mut self.buf)
                          .map_err(|e| BatchError::Read(format!("línea {}: {}", self.line + 1, e)))?;
            if n == 0 {
                return Ok(false);
            }
            self.line += 1;
            while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
                self.buf.pop();
            }
            if !self.buf.is_empty() {
                return Ok(true);
            }
        }
    }

    fn field_set(&self) -> Result<FieldSet> {
        let raw = String::from_utf8_lossy(&self.buf).into_owned();
        let parse_error = |cause: String| ParseError { line: self.line, raw: raw.clone(), cause };
        let mut record = ByteRecord::new();
        ReaderBuilder::new().has_headers(false)
                            .delimiter(b',')
                            .flexible(true)
                            .trim(Trim::All)
                            .from_reader(self.buf.as_slice())
                            .read_byte_record(&mut record)
                            .map_err(|e| parse_error(e.to_string()))?;
        let mut values = Vec::with_capacity(record.len());
        for (idx, field) in record.iter().enumerate() {
            let value = std::str::from_utf8(field).map_err(|e| {
                                                      parse_error(format!("campo {}: UTF-8 inválido ({})",
                                                                          idx + 1,
                                                                          e))
                                                  })?;
            values.push(value.to_string());
        }
        Ok(FieldSet { names: Arc::clone(&self.names), values, line: self.line, raw })
    }
}

impl<T> ItemReader<T> for FlatFileItemReader<T> {
    fn open(&mut self) -> Result<()> {
        let input: Box<dyn BufRead + Send> = match &self.source {
            Source::Path(path) => {
                let file = File::open(path).map_err(|e| {
                                               BatchError::Read(format!("no se pudo abrir '{}': {}",
                                                                        path.display(),
                                                                        e))
                                           })?;
                Box::new(BufReader::new(file))
            }
            Source::Bytes(bytes) => Box::new(Cursor::new(bytes.clone())),
        };
        self.reader = Some(input);
        self.line = 0;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<T>> {
        if !self.next_line()? {
            return Ok(None);
        }
        let fields = self.field_set()?;
        if fields.len() != self.names.len() {
            return Err(fields.error(format!("se esperaban {} campos y hay {}", self.names.len(), fields.len())));
        }
        match (self.mapper)(&fields) {
            Ok(item) => Ok(Some(item)),
            Err(BatchError::Parse(e)) => Err(BatchError::Parse(e)),
            Err(other) => Err(fields.error(other.to_string())),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        self.buf.clear();
        Ok(())
    }
}

type LineAggregator<T> = Box<dyn Fn(&T) -> Vec<String> + Send>;

/// Destino de items como líneas delimitadas.
///
/// El fichero se trunca al abrir. Cada chunk se escribe y vuelca en
/// `write`; si la transacción se revierte el fichero se recorta a la
/// longitud del último commit.
pub struct FlatFileItemWriter<T> {
    path: PathBuf,
    aggregator: LineAggregator<T>,
    file: Option<File>,
    committed_len: u64,
}

impl<T> FlatFileItemWriter<T> {
    pub fn new<P, F>(path: P, aggregator: F) -> Self
        where P: AsRef<Path>,
              F: Fn(&T) -> Vec<String> + Send + 'static
    {
        Self { path: path.as_ref().to_path_buf(), aggregator: Box::new(aggregator), file: None, committed_len: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| BatchError::Storage(format!("'{}' no está abierto", self.path.display())))
    }
}

impl<T> ItemWriter<T> for FlatFileItemWriter<T> {
    fn open(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| BatchError::Storage(e.to_string()))?;
        }
        let file = OpenOptions::new().create(true)
                                     .write(true)
                                     .truncate(true)
                                     .open(&self.path)
                                     .map_err(|e| {
                                         BatchError::Storage(format!("no se pudo crear '{}': {}",
                                                                     self.path.display(),
                                                                     e))
                                     })?;
        self.file = Some(file);
        self.committed_len = 0;
        Ok(())
    }

    fn write(&mut self, items: &[T]) -> Result<()> {
        let mut out = WriterBuilder::new().has_headers(false).delimiter(b',').from_writer(Vec::new());
        for item in items {
            out.write_record((self.aggregator)(item))
               .map_err(|e| BatchError::Storage(e.to_string()))?;
        }
        let bytes = out.into_inner().map_err(|e| BatchError::Storage(e.to_string()))?;
        let file = self.file()?;
        file.write_all(&bytes).map_err(|e| BatchError::Storage(e.to_string()))?;
        file.flush().map_err(|e| BatchError::Storage(e.to_string()))?;
        Ok(())
    }

    fn after_commit(&mut self) -> Result<()> {
        let file = self.file()?;
        let len = file.stream_position().map_err(|e| BatchError::Storage(e.to_string()))?;
        self.committed_len = len;
        Ok(())
    }

    fn after_rollback(&mut self) {
        let committed = self.committed_len;
        if let Some(file) = self.file.as_mut() {
            let truncated = file.set_len(committed).and_then(|_| file.seek(SeekFrom::Start(committed)));
            match truncated {
                Ok(_) => debug!("'{}': recortado a {} bytes tras rollback", self.path.display(), committed),
                Err(e) => log::error!("'{}': no se pudo recortar tras rollback: {}", self.path.display(), e),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().map_err(|e| BatchError::Storage(e.to_string()))?;
            file.sync_all().map_err(|e| BatchError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}
