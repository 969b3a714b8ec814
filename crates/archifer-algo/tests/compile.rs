//! Constraint compilation tests

use archifer_algo::{
    compile_config, compile_into, compile_model, LinearExpr, LinearModel, ModelBuilder, VarId,
    VariableDef, DEFAULT_WEIGHT,
};
use archifer_core::{
    ArchetypeTable, ArchiferError, ConstraintSpec, FitConfig, TargetEntry, TargetRef, Targets,
    Weights,
};
use polars::prelude::*;

/// Three archetypes:
/// EFH: residential, 100 m²
/// MFH: residential, 400 m²
/// BUE: office, 500 m²
fn stock() -> ArchetypeTable {
    let frame = df!(
        "Typ" => &["EFH", "MFH", "BUE"],
        "Nutzung" => &["Wohnen", "Wohnen", "Buero"],
        "NGF" => &[100.0, 400.0, 500.0]
    )
    .unwrap();
    ArchetypeTable::new(frame).with_key_column("Typ").unwrap()
}

fn weights(entries: &[(&str, f64)]) -> Weights {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn soft_sum_adds_slack_pair_and_weighted_objective() {
    let mut targets = Targets::new();
    targets.insert("Af_total".into(), TargetEntry::Value(1500.0));
    let constraints = [ConstraintSpec::sum(
        "Af_total",
        "NGF",
        TargetRef::Key("Af_total".into()),
        false,
    )];

    let compiled = compile_model(
        &targets,
        &weights(&[("Af_total", 10.0)]),
        &constraints,
        &stock(),
    )
    .unwrap();
    let model = &compiled.model;

    assert_eq!(model.num_variables(), 5);
    assert_eq!(model.num_integer_variables(), 3);
    let pair = compiled.slack("Af_total").unwrap();
    assert_eq!(model.variable(pair.positive).unwrap().name, "s_Af_total_pos");
    assert_eq!(model.variable(pair.negative).unwrap().name, "s_Af_total_neg");

    let row = model.constraint("Af_total").unwrap();
    assert_close(row.expr.coefficient(compiled.count_var("EFH").unwrap()), 100.0);
    assert_close(row.expr.coefficient(compiled.count_var("BUE").unwrap()), 500.0);
    assert_close(row.expr.coefficient(pair.positive), -1.0);
    assert_close(row.expr.coefficient(pair.negative), 1.0);
    assert_close(row.rhs, 1500.0);

    assert_eq!(model.objective().num_terms(), 2);
    assert_close(model.objective().coefficient(pair.positive), 10.0);
    assert_close(model.objective().coefficient(pair.negative), 10.0);
}

#[test]
fn share_selects_numerator_rows() {
    let constraints = [ConstraintSpec::share(
        "share_residential_Af",
        "NGF",
        "Nutzung == 'Wohnen'",
        TargetRef::Value(0.5),
        true,
    )];
    let compiled =
        compile_model(&Targets::new(), &Weights::new(), &constraints, &stock()).unwrap();
    let row = compiled.model.constraint("share_residential_Af").unwrap();

    // selected: col - T·col, unselected: -T·col
    assert_close(row.expr.coefficient(compiled.count_var("EFH").unwrap()), 50.0);
    assert_close(row.expr.coefficient(compiled.count_var("MFH").unwrap()), 200.0);
    assert_close(row.expr.coefficient(compiled.count_var("BUE").unwrap()), -250.0);
    assert_close(row.rhs, 0.0);
    // one EFH, one MFH and one BUE give exactly half residential floor area
    assert_close(row.residual(&[1.0, 1.0, 1.0]), 0.0);
}

#[test]
fn soft_share_moves_slack_pair_into_ratio_row() {
    let constraints = [ConstraintSpec::share(
        "share_residential_Af",
        "NGF",
        "Nutzung == 'Wohnen'",
        TargetRef::Value(0.5),
        false,
    )];
    let compiled =
        compile_model(&Targets::new(), &Weights::new(), &constraints, &stock()).unwrap();
    let model = &compiled.model;

    assert_eq!(model.num_variables(), 5);
    let pair = compiled.slack("share_residential_Af").unwrap();
    assert_eq!(model.variable(pair.positive).unwrap().name, "s_share_residential_Af_pos");
    assert_eq!(model.variable(pair.negative).unwrap().name, "s_share_residential_Af_neg");

    // num - T·den == s_pos - s_neg
    let row = model.constraint("share_residential_Af").unwrap();
    assert_close(row.expr.coefficient(compiled.count_var("EFH").unwrap()), 50.0);
    assert_close(row.expr.coefficient(compiled.count_var("MFH").unwrap()), 200.0);
    assert_close(row.expr.coefficient(compiled.count_var("BUE").unwrap()), -250.0);
    assert_close(row.expr.coefficient(pair.positive), -1.0);
    assert_close(row.expr.coefficient(pair.negative), 1.0);
    assert_close(row.rhs, 0.0);
    // two EFH, one BUE: 200 residential of 700 total, 150 below half
    assert_close(row.residual(&[2.0, 0.0, 1.0, 0.0, 150.0]), 0.0);

    // the default rule names this constraint but `weights` has no entry
    assert_close(model.objective().coefficient(pair.positive), DEFAULT_WEIGHT);
    assert_close(model.objective().coefficient(pair.negative), DEFAULT_WEIGHT);
}

#[test]
fn hard_share_group_adds_one_row_per_category() {
    let mut targets = Targets::new();
    targets.insert(
        "share_use".into(),
        TargetEntry::Group(
            [("res".to_string(), 0.6), ("office".to_string(), 0.4)]
                .into_iter()
                .collect(),
        ),
    );
    let constraints = [ConstraintSpec::share_group(
        "share_use",
        "NGF",
        "share_use",
        &[("res", "Nutzung == 'Wohnen'"), ("office", "Nutzung == 'Buero'")],
        true,
    )];
    let compiled = compile_model(&targets, &Weights::new(), &constraints, &stock()).unwrap();
    let model = &compiled.model;

    assert_eq!(model.num_constraints(), 2);
    assert_eq!(model.num_variables(), 3);
    assert!(compiled.slacks.is_empty());
    assert_eq!(model.objective().num_terms(), 0);

    for (name, share) in [("share_use_res", 0.6), ("share_use_office", 0.4)] {
        let row = model.constraint(name).unwrap();
        for (key, area) in [("EFH", 100.0), ("MFH", 400.0), ("BUE", 500.0)] {
            let var = compiled.count_var(key).unwrap();
            assert_close(row.expr.coefficient(var), (1.0 - share) * area);
        }
        assert_close(row.rhs, 0.0);
    }
}

#[test]
fn share_group_expands_per_category() {
    let mut targets = Targets::new();
    targets.insert(
        "share_use".into(),
        TargetEntry::Group(
            [("res".to_string(), 0.6), ("office".to_string(), 0.4)]
                .into_iter()
                .collect(),
        ),
    );
    let constraints = [ConstraintSpec::share_group(
        "share_use",
        "NGF",
        "share_use",
        &[("res", "Nutzung == 'Wohnen'"), ("office", "Nutzung == 'Buero'")],
        false,
    )];

    let compiled = compile_model(&targets, &Weights::new(), &constraints, &stock()).unwrap();
    let model = &compiled.model;

    assert_eq!(model.num_constraints(), 2);
    assert_eq!(compiled.slacks.len(), 2);
    assert_eq!(model.num_variables(), 3 + 4);
    let names: Vec<&str> = compiled.slacks.keys().map(String::as_str).collect();
    assert_eq!(names, ["share_use_res", "share_use_office"]);
    assert!(model.find_variable("s_share_use_res_pos").is_some());
    assert!(model.find_variable("s_share_use_office_neg").is_some());

    // no default rule matches, so every slack is weighted with the default
    for pair in compiled.slacks.values() {
        assert_close(model.objective().coefficient(pair.positive), DEFAULT_WEIGHT);
        assert_close(model.objective().coefficient(pair.negative), DEFAULT_WEIGHT);
    }
}

/// Rows of a share_group ignore their category filter: numerator and
/// denominator both cover every archetype, giving (1 - T)·col per count.
#[test]
fn share_group_numerator_spans_all_archetypes() {
    let mut targets = Targets::new();
    targets.insert(
        "share_use".into(),
        TargetEntry::Group([("res".to_string(), 0.6)].into_iter().collect()),
    );
    let constraints = [ConstraintSpec::share_group(
        "share_use",
        "NGF",
        "share_use",
        &[("res", "Nutzung == 'Wohnen'")],
        true,
    )];
    let compiled = compile_model(&targets, &Weights::new(), &constraints, &stock()).unwrap();
    let row = compiled.model.constraint("share_use_res").unwrap();

    assert_close(row.expr.coefficient(compiled.count_var("EFH").unwrap()), 40.0);
    assert_close(row.expr.coefficient(compiled.count_var("MFH").unwrap()), 160.0);
    // office rows are outside the filter but still carry (1 - T)·col
    assert_close(row.expr.coefficient(compiled.count_var("BUE").unwrap()), 200.0);
}

#[test]
fn share_group_with_unknown_category_share() {
    let mut targets = Targets::new();
    targets.insert(
        "share_use".into(),
        TargetEntry::Group([("res".to_string(), 0.6)].into_iter().collect()),
    );
    let constraints = [ConstraintSpec::share_group(
        "share_use",
        "NGF",
        "share_use",
        &[("office", "Nutzung == 'Buero'")],
        false,
    )];
    let err = compile_model(&targets, &Weights::new(), &constraints, &stock()).unwrap_err();
    assert!(err.is_missing_key());
}

#[test]
fn weight_rules_choose_penalties() {
    let constraints = [
        ConstraintSpec::share(
            "share_energy_therm_gas",
            "NGF",
            "Nutzung == 'Wohnen'",
            TargetRef::Value(0.3),
            false,
        ),
        ConstraintSpec::sum("other", "NGF", TargetRef::Value(1000.0), false),
    ];
    let compiled = compile_model(
        &Targets::new(),
        &weights(&[("share_energy_therm", 3.0), ("other", 99.0)]),
        &constraints,
        &stock(),
    )
    .unwrap();
    let objective = compiled.model.objective();

    let gas = compiled.slack("share_energy_therm_gas").unwrap();
    assert_close(objective.coefficient(gas.positive), 3.0);
    let other = compiled.slack("other").unwrap();
    assert_close(objective.coefficient(other.negative), DEFAULT_WEIGHT);
}

#[test]
fn unknown_constraint_type() {
    let spec = ConstraintSpec {
        name: Some("x".into()),
        kind: Some("bogus".into()),
        column: Some("NGF".into()),
        ..ConstraintSpec::default()
    };
    let err = compile_model(&Targets::new(), &Weights::new(), &[spec], &stock()).unwrap_err();
    assert_eq!(err.to_string(), "Unknown constraint type: bogus");
}

#[test]
fn missing_target_key() {
    let constraints = [ConstraintSpec::sum(
        "Af_total",
        "NGF",
        TargetRef::Key("Af_total".into()),
        true,
    )];
    let err = compile_model(&Targets::new(), &Weights::new(), &constraints, &stock()).unwrap_err();
    assert!(matches!(err, ArchiferError::MissingKey { kind: "target", .. }));
}

#[test]
fn invalid_predicate() {
    let constraints = [ConstraintSpec::share(
        "s",
        "NGF",
        "Nutzung = 'Wohnen'",
        TargetRef::Value(0.5),
        false,
    )];
    let err = compile_model(&Targets::new(), &Weights::new(), &constraints, &stock()).unwrap_err();
    assert!(matches!(err, ArchiferError::Predicate(_)));
}

#[test]
fn compile_from_yaml_config() {
    let yaml = r#"
targets:
  Af_total: 1000
weights:
  Af_total: 4
weight_rules:
  - prefix: Af_
    weight: Af_total
constraints:
  - name: Af_total
    type: sum
    column: NGF
    target: Af_total
"#;
    let config: FitConfig = serde_yaml::from_str(yaml).unwrap();
    let frame = df!("NGF" => &[400.0, 600.0]).unwrap();
    let compiled = compile_config(&config, &ArchetypeTable::new(frame)).unwrap();

    let row = compiled.model.constraint("Af_total").unwrap();
    assert_close(row.rhs, 1000.0);
    let pair = compiled.slack("Af_total").unwrap();
    assert_close(compiled.model.objective().coefficient(pair.positive), 4.0);
}

/// Records calls instead of building a model.
#[derive(Default)]
struct Recorder {
    variables: Vec<String>,
    constraints: Vec<String>,
    objective_terms: usize,
}

impl ModelBuilder for Recorder {
    fn add_variable(&mut self, def: VariableDef) -> VarId {
        self.variables.push(def.name);
        VarId::new(self.variables.len() - 1)
    }

    fn add_constraint(&mut self, name: &str, _lhs: LinearExpr, _rhs: LinearExpr) {
        self.constraints.push(name.to_string());
    }

    fn add_objective_term(&mut self, _term: LinearExpr) {
        self.objective_terms += 1;
    }
}

#[test]
fn compile_into_custom_builder() {
    let constraints = [
        ConstraintSpec::sum("total", "NGF", TargetRef::Value(1000.0), false),
        ConstraintSpec::sum("hard_total", "NGF", TargetRef::Value(1000.0), true),
    ];
    let resolver = archifer_algo::WeightResolver::with_default_rules(Weights::new());
    let compiled = compile_into(
        &Targets::new(),
        &resolver,
        &constraints,
        &stock(),
        Recorder::default(),
    )
    .unwrap();

    let recorder = compiled.model;
    assert_eq!(
        recorder.variables,
        ["w_EFH", "w_MFH", "w_BUE", "s_total_pos", "s_total_neg"]
    );
    assert_eq!(recorder.constraints, ["total", "hard_total"]);
    assert_eq!(recorder.objective_terms, 1);
}

#[test]
fn linear_model_is_default_builder() {
    let compiled = compile_model(&Targets::new(), &Weights::new(), &[], &stock()).unwrap();
    let model: &LinearModel = &compiled.model;
    assert_eq!(model.name(), "Archetype_Inference");
    assert_eq!(compiled.counts.len(), 3);
    assert_eq!(compiled.counts[2].0, "BUE");
}
