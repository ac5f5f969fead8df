use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// CNAME target every SparkPost tracking domain points at
pub const TRACKING_CNAME_TARGET: &str = "spgo.io";

/// BIND TXT record publishing a DKIM public key
pub fn dkim_txt_record(selector: &str, domain: &str, public_key: &str) -> String {
    format!(
        "{}._domainkey.{}. IN TXT \"v=DKIM1; h=sha256; k=rsa; s=email; p={}\"",
        selector,
        domain.trim_end_matches('.'),
        public_key
    )
}

/// BIND CNAME record for a tracking domain
pub fn tracking_cname_record(domain: &str) -> String {
    format!("{} CNAME {}", domain, TRACKING_CNAME_TARGET)
}

/// Placeholder line written in place of a record that could not be produced
pub fn error_marker(domain: &str) -> String {
    format!("*** Error processing {}", domain)
}

/// Optional zone-file fragment written line by line during a run
pub struct RecordWriter {
    path: Option<PathBuf>,
    out: Option<BufWriter<File>>,
    written: usize,
}

impl RecordWriter {
    /// Create (truncate) the output file, or a no-op writer when no path is given
    pub fn create(path: Option<&Path>) -> io::Result<Self> {
        let out = match path {
            Some(path) => Some(BufWriter::new(File::create(path)?)),
            None => None,
        };
        Ok(Self {
            path: path.map(Path::to_path_buf),
            out,
            written: 0,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        if let Some(out) = self.out.as_mut() {
            writeln!(out, "{}", line)?;
            self.written += 1;
        }
        Ok(())
    }

    /// Flush and close the file
    pub fn finish(mut self) -> io::Result<usize> {
        if let Some(mut out) = self.out.take() {
            out.flush()?;
        }
        Ok(self.written)
    }
}
