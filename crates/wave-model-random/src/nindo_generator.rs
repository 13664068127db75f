//! Random Nindo generation driven by the [`NindoAutomaton`].
//!
//! Each component kind has a generator that asks the automaton which choices
//! the document and schema accept at the current position.  An opening phase
//! emits a random number of components of any kind.  A closing phase then
//! only considers kinds whose potential is below a rising threshold, which
//! favours kinds that close open elements, deletions and annotations, until
//! the mutation is well-formed.  A closing phase that gets stuck starts over.

use log::{debug, trace};
use wave_model::automaton::{NindoAutomaton, ValidationResult};
use wave_model::document::ReadableDocument;
use wave_model::nindo::AttributeUpdates;
use wave_model::schema::DocumentSchema;
use wave_model::validator::validate;
use wave_model::{Attributes, Nindo, NindoBuilder, NindoComponent};

use crate::fuzzer::Fuzzer;
use crate::parameters::Parameters;

/// Fresh generation runs tried before giving up.
pub const MAX_ATTEMPTS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Skip,
    Characters,
    DeleteCharacters,
    ElementStart,
    ElementEnd,
    DeleteElementStart,
    DeleteElementEnd,
    ReplaceAttributes,
    UpdateAttributes,
    StartAnnotation,
    EndAnnotation,
}

impl Kind {
    const ALL: [Kind; 11] = [
        Kind::Skip,
        Kind::Characters,
        Kind::DeleteCharacters,
        Kind::ElementStart,
        Kind::ElementEnd,
        Kind::DeleteElementStart,
        Kind::DeleteElementEnd,
        Kind::ReplaceAttributes,
        Kind::UpdateAttributes,
        Kind::StartAnnotation,
        Kind::EndAnnotation,
    ];

    /// Negative for kinds that close structure; the more negative, the
    /// earlier the closing phase admits it.
    fn potential(self) -> i32 {
        match self {
            Kind::DeleteCharacters => -2,
            Kind::ElementEnd | Kind::DeleteElementEnd | Kind::EndAnnotation => -3,
            Kind::DeleteElementStart => -1,
            Kind::Skip
            | Kind::Characters
            | Kind::ElementStart
            | Kind::ReplaceAttributes
            | Kind::UpdateAttributes
            | Kind::StartAnnotation => 0,
        }
    }
}

/// Generates a random mutation of `doc`.
///
/// With `params.valid` set the result passes [`validate`]; otherwise it is
/// well-formed but rejected as an invalid operation or a schema violation.
/// Returns `None` if no such mutation turned up in [`MAX_ATTEMPTS`] runs,
/// which happens for instance when nothing about `doc` can be made invalid.
pub fn generate<D, S>(fuzzer: &mut Fuzzer, params: &Parameters, schema: &S, doc: &D) -> Option<Nindo>
where
    D: ReadableDocument + ?Sized,
    S: DocumentSchema + ?Sized,
{
    for attempt in 0..MAX_ATTEMPTS {
        let Some(nindo) = Generator::new(fuzzer, params, schema, doc).run() else {
            trace!("attempt {attempt}: closing phase stuck");
            continue;
        };
        let result = validate(doc, &nindo, schema).validation_result();
        if result.is_valid() == params.valid && !result.is_ill_formed() {
            debug!("generated {} components in {} attempts: {}", nindo.len(), attempt + 1, result);
            return Some(nindo);
        }
        trace!("attempt {attempt}: discarding {nindo}({result})");
    }
    debug!(
        "no {} mutation found in {MAX_ATTEMPTS} attempts",
        if params.valid { "valid" } else { "invalid" }
    );
    None
}

fn admits(result: ValidationResult, valid: bool) -> bool {
    if valid {
        result.is_valid()
    } else {
        !result.is_ill_formed()
    }
}

fn letters(count: usize) -> String {
    (0..count).map(|i| char::from(b'a' + (i % 26) as u8)).collect()
}

fn with_update(base: &AttributeUpdates, name: &str, value: Option<&str>) -> AttributeUpdates {
    let mut updates = base.clone();
    updates.insert(name.to_string(), value.map(str::to_string));
    updates
}

/// Attributes set by `updates`; removals are dropped.
fn to_attributes(updates: &AttributeUpdates) -> Attributes {
    Attributes::from_pairs(
        updates
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k.as_str(), v))),
    )
    .unwrap_or_default()
}

// ── Generator ─────────────────────────────────────────────────────────────

struct Generator<'a, D: ReadableDocument + ?Sized, S: DocumentSchema + ?Sized> {
    fuzzer: &'a mut Fuzzer,
    params: &'a Parameters,
    automaton: NindoAutomaton<'a, D, S>,
    builder: NindoBuilder,
}

impl<'a, D: ReadableDocument + ?Sized, S: DocumentSchema + ?Sized> Generator<'a, D, S> {
    fn new(fuzzer: &'a mut Fuzzer, params: &'a Parameters, schema: &'a S, doc: &'a D) -> Self {
        Self {
            fuzzer,
            params,
            automaton: NindoAutomaton::new(schema, doc),
            builder: NindoBuilder::new(),
        }
    }

    fn run(mut self) -> Option<Nindo> {
        let valid = self.params.valid;
        let desired = self.fuzzer.random_int(0, self.params.max_opening_components);
        for _ in 0..desired {
            match self.pick_map(&Kind::ALL, |g, kind| g.component(*kind, valid)) {
                Some(component) => self.apply(component),
                None => break,
            }
        }

        while self.automaton.check_finish(None).is_ill_formed() {
            let mut threshold = -4;
            let mut component = None;
            while component.is_none() && threshold < 0 {
                threshold += 1;
                component = self.pick_map(&Kind::ALL, |g, kind| {
                    if kind.potential() < threshold {
                        g.component(*kind, valid)
                    } else {
                        None
                    }
                });
            }
            self.apply(component?);
        }
        self.automaton.do_finish();
        Some(self.builder.build())
    }

    fn apply(&mut self, component: NindoComponent) {
        trace!("{component}at {}", self.automaton.effective_pos());
        self.automaton.do_component(&component);
        self.builder.push(component);
    }

    /// Tries `f` on the items in random order; first `Some` wins.
    fn pick_map<T, O>(&mut self, items: &[T], mut f: impl FnMut(&mut Self, &T) -> Option<O>) -> Option<O> {
        let mut pool: Vec<&T> = items.iter().collect();
        while !pool.is_empty() {
            let i = self.fuzzer.random_int(0, pool.len());
            if let Some(out) = f(self, pool[i]) {
                return Some(out);
            }
            pool.swap_remove(i);
        }
        None
    }

    fn component(&mut self, kind: Kind, valid: bool) -> Option<NindoComponent> {
        match kind {
            Kind::Skip => self.skip(valid),
            Kind::Characters => self.characters(valid),
            Kind::DeleteCharacters => self.delete_characters(valid),
            Kind::ElementStart => self.element_start(valid),
            Kind::ElementEnd => self.fixed(NindoComponent::ElementEnd, valid),
            Kind::DeleteElementStart => self.fixed(NindoComponent::DeleteElementStart, valid),
            Kind::DeleteElementEnd => self.fixed(NindoComponent::DeleteElementEnd, valid),
            Kind::ReplaceAttributes => self
                .random_attributes(valid, false, |a, u| a.check_replace_attributes(&to_attributes(u), None))
                .map(|u| NindoComponent::ReplaceAttributes(to_attributes(&u))),
            Kind::UpdateAttributes => self
                .random_attributes(valid, true, |a, u| a.check_update_attributes(u, None))
                .map(NindoComponent::UpdateAttributes),
            Kind::StartAnnotation => self.start_annotation(valid),
            Kind::EndAnnotation => self.end_annotation(valid),
        }
    }

    fn skip(&mut self, valid: bool) -> Option<NindoComponent> {
        let max = self.automaton.max_skip_distance();
        if max == 0 || self.automaton.check_skip(1, None).is_ill_formed() {
            return None;
        }
        let distance = if valid {
            self.fuzzer.random_int(1, max + 1)
        } else {
            let past_end = self.params.max_skip_after_end;
            if past_end == 0 {
                return None;
            }
            self.fuzzer.random_int(max + 1, max + past_end + 1)
        };
        Some(NindoComponent::Skip(distance))
    }

    fn characters(&mut self, valid: bool) -> Option<NindoComponent> {
        let sample = self.automaton.check_characters("a", None);
        if sample.is_ill_formed() {
            return None;
        }
        let max_insert = self.params.max_insert_length;
        let count = if valid {
            if !sample.is_valid() {
                return None;
            }
            let max = self.automaton.max_length_increase().min(max_insert);
            if max == 0 {
                return None;
            }
            self.fuzzer.random_int(1, max + 1)
        } else if sample.is_valid() {
            // Only a length overflow can make text invalid here.
            let min = self.automaton.max_length_increase().saturating_add(1);
            if min > max_insert {
                return None;
            }
            self.fuzzer.random_int(min, max_insert + 1)
        } else {
            if max_insert == 0 {
                return None;
            }
            self.fuzzer.random_int(1, max_insert + 1)
        };
        Some(NindoComponent::Characters(letters(count)))
    }

    fn delete_characters(&mut self, valid: bool) -> Option<NindoComponent> {
        if self.automaton.check_delete_characters(1, None).is_ill_formed() {
            return None;
        }
        let available = self.automaton.max_characters_to_delete();
        let max_delete = self.params.max_delete_length;
        let count = if valid {
            let max = available.min(max_delete);
            if max == 0 {
                return None;
            }
            self.fuzzer.random_int(1, max + 1)
        } else {
            let min = available + 1;
            if min > max_delete {
                return None;
            }
            self.fuzzer.random_int(min, max_delete + 1)
        };
        Some(NindoComponent::DeleteCharacters(count))
    }

    /// For kinds without parameters: keep `component` if the automaton's
    /// verdict matches the requested validity.
    fn fixed(&self, component: NindoComponent, valid: bool) -> Option<NindoComponent> {
        let result = self.automaton.check_component(&component, None);
        if result.is_ill_formed() || result.is_valid() != valid {
            return None;
        }
        Some(component)
    }

    fn element_start(&mut self, valid: bool) -> Option<NindoComponent> {
        let params = self.params;
        self.pick_map(&params.element_types, |g, tag| {
            let updates =
                g.random_attributes(valid, false, |a, u| a.check_element_start(tag, &to_attributes(u), None))?;
            Some(NindoComponent::ElementStart {
                tag: tag.clone(),
                attrs: to_attributes(&updates),
            })
        })
    }

    /// Grows an attribute map one random entry at a time while a coin keeps
    /// landing heads, keeping `check` acceptable at every step.  For an
    /// invalid mutation the first entry is chosen to make `check` fail.
    fn random_attributes<F>(&mut self, valid: bool, removals: bool, check: F) -> Option<AttributeUpdates>
    where
        F: Fn(&NindoAutomaton<'a, D, S>, &AttributeUpdates) -> ValidationResult,
    {
        let params = self.params;
        let values: Vec<Option<&str>> = params
            .attribute_values
            .iter()
            .map(|v| v.as_deref())
            .filter(|v| removals || v.is_some())
            .collect();

        let mut acc = AttributeUpdates::new();
        let empty = check(&self.automaton, &acc);
        if !admits(empty, valid) {
            return None;
        }
        if !valid {
            if empty.is_valid() {
                acc = self.pick_map(&params.attribute_names, |g, name| {
                    g.pick_map(&values, |g, value| {
                        let candidate = with_update(&AttributeUpdates::new(), name, *value);
                        let r = check(&g.automaton, &candidate);
                        (!r.is_valid() && !r.is_ill_formed()).then_some(candidate)
                    })
                })?;
            }
            if self.fuzzer.random_bool() {
                return Some(acc);
            }
        }

        while self.fuzzer.random_bool() {
            let grown = self.pick_map(&params.attribute_names, |g, name| {
                if acc.contains_key(name) {
                    return None;
                }
                g.pick_map(&values, |g, value| {
                    let candidate = with_update(&acc, name, *value);
                    admits(check(&g.automaton, &candidate), valid).then_some(candidate)
                })
            });
            match grown {
                Some(next) => acc = next,
                None => break,
            }
        }
        Some(acc)
    }

    fn start_annotation(&mut self, valid: bool) -> Option<NindoComponent> {
        if !valid {
            return None;
        }
        let params = self.params;
        let option = self.fuzzer.pick(&params.annotation_options)?;
        let value = self.fuzzer.pick(&option.values)?.clone();
        Some(NindoComponent::StartAnnotation {
            key: option.key.clone(),
            value,
        })
    }

    fn end_annotation(&mut self, valid: bool) -> Option<NindoComponent> {
        if !valid {
            return None;
        }
        let params = self.params;
        let keys: Vec<&str> = params.annotation_keys().collect();
        self.pick_map(&keys, |g, key| {
            g.automaton
                .check_end_annotation(key, None)
                .is_valid()
                .then(|| NindoComponent::EndAnnotation(key.to_string()))
        })
    }
}
