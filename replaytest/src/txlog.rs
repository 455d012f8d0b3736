//! Transaction-log parsing.
//!
//! The log is line oriented: a count of initial triples followed by their
//! `s`/`p`/`o` entry lines, then a count of transactions followed by one
//! record each (predicate count, subject entry, object entry, predicate
//! entries). Entry lines are generic `key value` pairs; only the value
//! after the first whitespace-delimited token is consumed.
//!
//! The first half of the transactions is folded into the bulk-load set
//! together with the initial triples; the second half forms the replay
//! workload.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use anyhow::{Context, Result, bail};
use triplestore::Statement;

/// One replayable transaction record: a subject/object pair plus the
/// predicates to apply between them.
#[derive(Clone, Debug)]
pub struct TxRecord {
    /// The subject entity identifier.
    pub subject: String,
    /// The object entity identifier.
    pub object: String,
    /// Ordered relation identifiers to apply against (subject, object).
    pub predicates: Vec<String>,
}

/// A parsed transaction log.
#[derive(Debug)]
pub struct TransactionLog {
    /// Statements loaded before the measured phase: the initial triples
    /// plus the first half of the transactions.
    pub bulk: Vec<Statement>,
    /// The second half of the transactions, replayed under pacing.
    pub replay: Vec<TxRecord>,
}

/// Reads and parses the transaction log at `path`.
pub fn load(path: &Path) -> Result<TransactionLog> {
    let file = File::open(path)
        .with_context(|| format!("failed to open transaction log {}", path.display()))?;
    parse(BufReader::new(file))
}

/// Parses a transaction log from any buffered reader.
pub fn parse(reader: impl BufRead) -> Result<TransactionLog> {
    let mut reader = LogReader {
        lines: reader.lines(),
        line: 0,
    };

    let mut bulk = Vec::new();

    let triple_count = reader.read_count().context("initial triple count")?;
    for index in 0..triple_count {
        let record = || format!("initial triple {index}");
        let subject = reader.read_entry().with_context(record)?;
        let predicate = reader.read_entry().with_context(record)?;
        let object = reader.read_entry().with_context(record)?;
        bulk.push(Statement::new(subject, predicate, object));
    }

    let tx_count = reader.read_count().context("transaction count")?;
    let initial_transactions = tx_count / 2;

    let mut replay = Vec::with_capacity(tx_count - initial_transactions);
    for index in 0..tx_count {
        let record = reader
            .read_transaction()
            .with_context(|| format!("transaction {index}"))?;
        if index < initial_transactions {
            for predicate in &record.predicates {
                bulk.push(Statement::new(&record.subject, predicate, &record.object));
            }
        } else {
            replay.push(record);
        }
    }

    Ok(TransactionLog { bulk, replay })
}

struct LogReader<R> {
    lines: Lines<R>,
    line: usize,
}

impl<R: BufRead> LogReader<R> {
    fn next_line(&mut self) -> Result<String> {
        self.line += 1;
        match self.lines.next() {
            Some(line) => Ok(line.with_context(|| format!("read error at line {}", self.line))?),
            None => bail!("unexpected end of file at line {}", self.line),
        }
    }

    fn read_count(&mut self) -> Result<usize> {
        let line = self.next_line()?;
        line.trim()
            .parse()
            .with_context(|| format!("expected a count at line {}, got {line:?}", self.line))
    }

    /// Reads a `key value` entry line, stripping the leading token.
    fn read_entry(&mut self) -> Result<String> {
        let line = self.next_line()?;
        match line.split_once(' ') {
            Some((_key, value)) => Ok(value.to_owned()),
            None => bail!("malformed entry at line {}: {line:?}", self.line),
        }
    }

    fn read_transaction(&mut self) -> Result<TxRecord> {
        let predicate_count = self.read_count()?;
        let subject = self.read_entry()?;
        let object = self.read_entry()?;
        let predicates = (0..predicate_count)
            .map(|_| self.read_entry())
            .collect::<Result<Vec<_>>>()?;

        Ok(TxRecord {
            subject,
            object,
            predicates,
        })
    }
}
