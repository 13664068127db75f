//! [`RawAnnotationSet`]: run-length annotation storage with a single-pass
//! edit transaction.
//!
//! The committed state is a list of runs, each a length and the values held
//! by every position in it.  Adjacent runs always hold different values.
//!
//! An edit is one left-to-right pass:
//!
//! ```text
//! begin  (skip | insert | delete | start_annotation | end_annotation)*  finish
//! ```
//!
//! Inserted positions take the values of the item most recently skipped or
//! deleted in the same pass (nothing at the start of the pass); annotations
//! opened with `start_annotation` then paint over skipped and inserted items
//! until the matching `end_annotation`.  Queries only see committed state.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;

use super::{
    check_range, AnnotationError, AnnotationSetListener, NoopListener, ReadableAnnotationSet, ValueSpans,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Run {
    len: usize,
    values: BTreeMap<String, String>,
}

fn push_run(runs: &mut Vec<Run>, len: usize, values: BTreeMap<String, String>) {
    if len == 0 {
        return;
    }
    match runs.last_mut() {
        Some(last) if last.values == values => last.len += len,
        _ => runs.push(Run { len, values }),
    }
}

#[derive(Debug, Default)]
struct Transaction {
    run: usize,
    offset: usize,
    consumed: usize,
    output: Vec<Run>,
    loc: usize,
    open: BTreeMap<String, (usize, Option<String>)>,
    last_values: BTreeMap<String, String>,
    changes: Vec<(usize, usize, String, Option<String>)>,
    /// Key → index of its latest entry in `changes`.
    last_change: BTreeMap<String, usize>,
}

impl Transaction {
    fn paint(&self, values: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut painted = values.clone();
        for (key, (_, value)) in &self.open {
            match value {
                Some(v) => painted.insert(key.clone(), v.clone()),
                None => painted.remove(key),
            };
        }
        painted
    }

    /// Records `[start, loc)` painted with `value`, extending the key's
    /// previous range when the two touch and agree.
    fn close(&mut self, key: String, start: usize, value: Option<String>) {
        if start >= self.loc {
            return;
        }
        if let Some(&i) = self.last_change.get(&key) {
            let previous = &mut self.changes[i];
            if previous.1 == start && previous.3 == value {
                previous.1 = self.loc;
                return;
            }
        }
        self.last_change.insert(key.clone(), self.changes.len());
        self.changes.push((start, self.loc, key, value));
    }
}

#[derive(Debug)]
pub struct RawAnnotationSet<L: AnnotationSetListener = NoopListener> {
    runs: Vec<Run>,
    /// Offset of each run, rebuilt on commit.
    starts: Vec<usize>,
    size: usize,
    listener: L,
    txn: Option<Transaction>,
}

impl RawAnnotationSet<NoopListener> {
    pub fn new() -> Self {
        Self::with_listener(NoopListener)
    }
}

impl Default for RawAnnotationSet<NoopListener> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: AnnotationSetListener + Clone> Clone for RawAnnotationSet<L> {
    /// Clones committed state; an open transaction is not carried over.
    fn clone(&self) -> Self {
        Self {
            runs: self.runs.clone(),
            starts: self.starts.clone(),
            size: self.size,
            listener: self.listener.clone(),
            txn: None,
        }
    }
}

impl<L: AnnotationSetListener> RawAnnotationSet<L> {
    pub fn with_listener(listener: L) -> Self {
        Self {
            runs: Vec::new(),
            starts: Vec::new(),
            size: 0,
            listener,
            txn: None,
        }
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    /// Replaces the listener, keeping the annotation state.
    pub fn map_listener<M: AnnotationSetListener>(self, f: impl FnOnce(L) -> M) -> RawAnnotationSet<M> {
        RawAnnotationSet {
            runs: self.runs,
            starts: self.starts,
            size: self.size,
            listener: f(self.listener),
            txn: self.txn,
        }
    }

    // ── Transaction ───────────────────────────────────────────────────────

    pub fn begin(&mut self) {
        debug_assert!(self.txn.is_none(), "nested annotation transaction");
        self.txn = Some(Transaction::default());
    }

    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    /// Drops the transaction in progress, leaving the committed state as is.
    pub fn abort(&mut self) {
        self.txn = None;
    }

    fn txn_mut(&mut self) -> Result<&mut Transaction, AnnotationError> {
        self.txn.as_mut().ok_or(AnnotationError::NoTransaction)
    }

    pub fn insert(&mut self, n: usize) -> Result<(), AnnotationError> {
        let txn = self.txn.as_mut().ok_or(AnnotationError::NoTransaction)?;
        let values = txn.paint(&txn.last_values);
        push_run(&mut txn.output, n, values);
        txn.loc += n;
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<(), AnnotationError> {
        self.advance(n, true)
    }

    pub fn delete(&mut self, n: usize) -> Result<(), AnnotationError> {
        self.advance(n, false)
    }

    /// Walks `n` committed items, copying them (skip) or dropping them (delete).
    fn advance(&mut self, n: usize, keep: bool) -> Result<(), AnnotationError> {
        let size = self.size;
        let runs = &self.runs;
        let txn = self.txn.as_mut().ok_or(AnnotationError::NoTransaction)?;
        let available = size - txn.consumed;
        if n > available {
            return Err(if keep {
                AnnotationError::SkipBeyondEnd { requested: n, available }
            } else {
                AnnotationError::DeleteBeyondEnd { requested: n, available }
            });
        }
        let mut left = n;
        while left > 0 {
            let run = &runs[txn.run];
            let take = left.min(run.len - txn.offset);
            if keep {
                let painted = txn.paint(&run.values);
                push_run(&mut txn.output, take, painted);
                txn.loc += take;
            }
            txn.last_values = run.values.clone();
            txn.offset += take;
            if txn.offset == run.len {
                txn.run += 1;
                txn.offset = 0;
            }
            left -= take;
        }
        txn.consumed += n;
        Ok(())
    }

    /// Opens `key` with `value` at the current position; `None` clears it.
    /// Opening an open key with a different value ends its previous range
    /// here; with the same value the range just continues.
    pub fn start_annotation(&mut self, key: &str, value: Option<&str>) -> Result<(), AnnotationError> {
        let txn = self.txn_mut()?;
        if txn.open.get(key).is_some_and(|(_, open)| open.as_deref() == value) {
            return Ok(());
        }
        if let Some((start, previous)) = txn.open.remove(key) {
            txn.close(key.to_string(), start, previous);
        }
        let loc = txn.loc;
        txn.open.insert(key.to_string(), (loc, value.map(str::to_owned)));
        Ok(())
    }

    pub fn end_annotation(&mut self, key: &str) -> Result<(), AnnotationError> {
        let txn = self.txn_mut()?;
        match txn.open.remove(key) {
            Some((start, value)) => {
                txn.close(key.to_string(), start, value);
                Ok(())
            }
            None => Err(AnnotationError::NotOpen(key.to_string())),
        }
    }

    /// Commits the transaction and notifies the listener.
    ///
    /// With annotations still open the transaction is discarded.
    pub fn finish(&mut self) -> Result<(), AnnotationError> {
        let mut txn = self.txn.take().ok_or(AnnotationError::NoTransaction)?;
        if let Some(key) = txn.open.keys().next() {
            return Err(AnnotationError::UnclosedAnnotation(key.clone()));
        }
        let mut runs = std::mem::take(&mut self.runs);
        if txn.run < runs.len() {
            let first = &mut runs[txn.run];
            first.len -= txn.offset;
            for run in runs.drain(txn.run..) {
                push_run(&mut txn.output, run.len, run.values);
            }
        }
        self.runs = txn.output;
        self.starts.clear();
        let mut at = 0;
        for run in &self.runs {
            self.starts.push(at);
            at += run.len;
        }
        self.size = at;
        trace!("annotation set committed: size {} in {} runs", self.size, self.runs.len());
        for (start, end, key, value) in txn.changes {
            self.listener.on_annotation_change(start, end, &key, value.as_deref());
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// Index of the run holding `pos`; `pos` must be below `size`.
    fn run_at(&self, pos: usize) -> usize {
        self.starts.partition_point(|&start| start <= pos) - 1
    }

    /// Committed runs overlapping `[start, end)` as unclipped
    /// `(start, end, values)`.  The range must already be checked.
    fn spans(&self, start: usize, end: usize) -> impl DoubleEndedIterator<Item = (usize, usize, &BTreeMap<String, String>)> + '_ {
        let indices = if start < end {
            self.run_at(start)..self.run_at(end - 1) + 1
        } else {
            0..0
        };
        indices.map(move |i| (self.starts[i], self.starts[i] + self.runs[i].len, &self.runs[i].values))
    }

    /// Every value held at `pos`.
    pub fn values_at(&self, pos: usize) -> Result<&BTreeMap<String, String>, AnnotationError> {
        if pos >= self.size {
            return Err(AnnotationError::IndexOutOfBounds { pos, size: self.size });
        }
        Ok(&self.runs[self.run_at(pos)].values)
    }
}

impl<L: AnnotationSetListener> ReadableAnnotationSet for RawAnnotationSet<L> {
    fn size(&self) -> usize {
        self.size
    }

    fn get_annotation(&self, pos: usize, key: &str) -> Result<Option<&str>, AnnotationError> {
        Ok(self.values_at(pos)?.get(key).map(String::as_str))
    }

    fn first_annotation_change(
        &self,
        start: usize,
        end: usize,
        key: &str,
        from: Option<&str>,
    ) -> Result<Option<usize>, AnnotationError> {
        check_range(start, end, self.size)?;
        Ok(self
            .spans(start, end)
            .find(|(_, _, values)| values.get(key).map(String::as_str) != from)
            .map(|(s, _, _)| s.max(start)))
    }

    fn last_annotation_change(
        &self,
        start: usize,
        end: usize,
        key: &str,
        from: Option<&str>,
    ) -> Result<Option<usize>, AnnotationError> {
        check_range(start, end, self.size)?;
        Ok(self
            .spans(start, end)
            .rev()
            .find(|(_, _, values)| values.get(key).map(String::as_str) != from)
            .map(|(_, e, _)| e.min(end)))
    }

    fn keys_in_range(&self, start: usize, end: usize) -> Result<BTreeSet<String>, AnnotationError> {
        check_range(start, end, self.size)?;
        Ok(self
            .spans(start, end)
            .flat_map(|(_, _, values)| values.keys().cloned())
            .collect())
    }

    fn value_spans(&self, start: usize, end: usize) -> Result<ValueSpans<'_>, AnnotationError> {
        check_range(start, end, self.size)?;
        Ok(Box::new(
            self.spans(start, end)
                .map(move |(s, e, values)| (s.max(start), e.min(end), values)),
        ))
    }
}
