use proptest::prelude::*;
use wave_model::automaton::ValidationResult;
use wave_model::document::IndexedDocument;
use wave_model::schema::{DocumentSchema, NoSchema, SchemaDefinition};
use wave_model::validator::validate;
use wave_model_random::{generate, Fuzzer, Parameters};

const CONVERSATION: &str = r#"{
    "roots": ["body"],
    "elements": {
        "body": { "children": ["line", "image"], "characters": "blip_text" },
        "line": { "attributes": { "t": ["h1", "h2", "h3", "li"], "i": null } },
        "image": { "children": ["caption"], "attributes": { "attachment": null } },
        "caption": { "characters": "blip_text" }
    }
}"#;

const FIXTURES: [&str; 4] = [
    "",
    "<body></body>",
    "<body><line t=\"h1\"/>abc<line/>de</body>",
    "<body><line/>a<?a \"a\"=\"1\"?>bc<?a \"a\"?><image attachment=\"x\"><caption>hi</caption></image></body>",
];

fn conversation() -> SchemaDefinition {
    SchemaDefinition::from_json(CONVERSATION).expect("schema fixture must parse")
}

fn doc(xml: &str) -> IndexedDocument {
    IndexedDocument::from_xml(xml).expect("fixture xml must parse")
}

/// Generates and applies `steps` valid mutations in a row, checking each one
/// against the validator and its own inverse.
fn run_valid_chain<S: DocumentSchema>(seed: u64, xml: &str, schema: &S, steps: usize) {
    let mut fuzzer = Fuzzer::from_seed_u64(seed);
    let params = Parameters::default();
    let mut d = doc(xml);
    for step in 0..steps {
        let nindo = generate(&mut fuzzer, &params, schema, &d)
            .unwrap_or_else(|| panic!("seed {seed} step {step}: no valid mutation of {}", d.to_xml_string()));
        let v = validate(&d, &nindo, schema);
        assert!(v.is_valid(), "seed {seed} step {step}: {nindo}rejected: {v}");

        let before = d.to_xml_string();
        let op = d
            .consume_nindo(&nindo)
            .unwrap_or_else(|e| panic!("seed {seed} step {step}: {nindo}failed on {before}: {e}"));
        let after = d.to_xml_string();

        let mut reverted = doc(&after);
        reverted
            .consume(&op.invert())
            .unwrap_or_else(|e| panic!("seed {seed} step {step}: inverse of {op}failed: {e}"));
        assert_eq!(reverted.to_xml_string(), before, "seed {seed} step {step}: {op}");
    }
}

#[test]
fn random_valid_mutations_apply_and_invert_without_schema() {
    for seed in 0..40 {
        for xml in FIXTURES {
            run_valid_chain(seed, xml, &NoSchema, 8);
        }
    }
}

#[test]
fn random_valid_mutations_respect_schema() {
    let schema = conversation();
    for seed in 0..40 {
        for xml in FIXTURES {
            run_valid_chain(seed, xml, &schema, 8);
        }
    }
}

#[test]
fn random_invalid_mutations_are_well_formed_but_rejected() {
    let schema = conversation();
    let params = Parameters::default().with_valid(false);
    for seed in 0..60 {
        let mut fuzzer = Fuzzer::from_seed_u64(seed);
        for xml in &FIXTURES[1..] {
            let d = doc(xml);
            let nindo = generate(&mut fuzzer, &params, &schema, &d)
                .unwrap_or_else(|| panic!("seed {seed}: no invalid mutation of {xml}"));
            let result = validate(&d, &nindo, &schema).validation_result();
            assert!(
                matches!(result, ValidationResult::InvalidDocument | ValidationResult::InvalidSchema),
                "seed {seed}: {nindo}on {xml} was {result}"
            );
        }
    }
}

#[test]
fn random_generation_is_reproducible_from_seed() {
    let schema = conversation();
    let d = doc(FIXTURES[3]);
    let params = Parameters::default();
    for seed in [0u64, 1, 7, 1234, u64::MAX] {
        let mut a = Fuzzer::from_seed_u64(seed);
        let mut b = Fuzzer::from_seed_u64(seed);
        for _ in 0..5 {
            assert_eq!(
                generate(&mut a, &params, &schema, &d),
                generate(&mut b, &params, &schema, &d)
            );
        }
    }
}

#[test]
fn random_mutations_stay_within_parameters() {
    let params = Parameters::from_json(r#"{ "maxInsertLength": 2, "maxDeleteLength": 1, "annotationOptions": [] }"#)
        .expect("parameters must parse");
    let d = doc(FIXTURES[2]);
    for seed in 0..50 {
        let mut fuzzer = Fuzzer::from_seed_u64(seed);
        let nindo = generate(&mut fuzzer, &params, &NoSchema, &d).expect("valid mutation must exist");
        for component in &nindo {
            match component {
                wave_model::NindoComponent::Characters(s) => assert!(s.chars().count() <= 2, "{nindo}"),
                wave_model::NindoComponent::DeleteCharacters(n) => assert!(*n <= 1, "{nindo}"),
                wave_model::NindoComponent::StartAnnotation { .. } => panic!("unexpected annotation in {nindo}"),
                _ => {}
            }
        }
    }
}

proptest! {
    #[test]
    fn property_any_seed_yields_applicable_mutation(seed in any::<u64>()) {
        let schema = conversation();
        let mut fuzzer = Fuzzer::from_seed_u64(seed);
        let mut d = doc(FIXTURES[3]);
        let nindo = generate(&mut fuzzer, &Parameters::default(), &schema, &d);
        prop_assert!(nindo.is_some());
        let nindo = nindo.unwrap();
        prop_assert!(validate(&d, &nindo, &schema).is_valid());
        prop_assert!(d.consume_nindo(&nindo).is_ok());
    }
}
