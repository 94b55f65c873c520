use query_core::ast::{CompareOperator, Expr};
use query_core::{
    compile_filter, CompileLimits, DynamicQuery, Error, FieldKind, FieldSet, Filter, FilterError,
    Logic, Operator, Sort,
};

fn fields() -> FieldSet {
    FieldSet::new()
        .insert("age", FieldKind::I64)
        .insert("firstName", FieldKind::String)
        .insert("lastName", FieldKind::String)
        .insert("email", FieldKind::String)
        .insert("score", FieldKind::F64)
}

fn compile(f: &Filter) -> Result<query_core::CompiledFilter, Error> {
    compile_filter(f, &fields(), &CompileLimits::default())
}

#[test]
fn age_range_scenario() {
    let f: Filter = serde_json::from_str(
        r#"{"field":"age","operator":"gte","value":"18","logic":"and",
            "filters":[{"field":"age","operator":"lt","value":"65"}]}"#,
    )
    .unwrap();

    let compiled = compile(&f).unwrap();
    assert_eq!(compiled.to_string(), "age >= @0 and (age < @1)");
    assert_eq!(compiled.params, vec!["18", "65"]);

    match compiled.expr.unwrap() {
        Expr::And(items) => {
            assert!(matches!(
                items[0],
                Expr::Compare { op: CompareOperator::Ge, param: 0, .. }
            ));
            assert!(matches!(items[1], Expr::And(ref inner) if inner.len() == 1));
        }
        other => panic!("expected And, got {other:?}"),
    }
}

#[test]
fn compile_is_deterministic() {
    let f = Filter::leaf("lastName", Operator::StartsWith, "Mc")
        .with_logic(Logic::Or)
        .with_filters([
            Filter::leaf("age", Operator::Lte, "30"),
            Filter::new("email", Operator::IsNotEmpty)
                .with_logic(Logic::And)
                .with_filters([Filter::leaf("email", Operator::EndsWith, "@acme.io")]),
        ]);

    let first = compile(&f).unwrap();
    let second = compile(&f).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn param_count_equals_value_carrying_nodes() {
    let f = Filter::new("email", Operator::IsNull)
        .with_logic(Logic::Or)
        .with_filters([
            Filter::leaf("age", Operator::Gt, "10"),
            Filter::new("firstName", Operator::IsEmpty),
            // value operator without a value contributes nothing
            Filter::new("lastName", Operator::Eq),
            Filter::leaf("lastName", Operator::Contains, "son"),
            // the null family ignores any value it is given
            Filter::leaf("firstName", Operator::IsNotNull, "ignored"),
        ]);

    let compiled = compile(&f).unwrap();
    let expected = f
        .pre_order()
        .into_iter()
        .filter(|n| {
            n.operator.parse::<Operator>().unwrap().consumes_value()
                && n.value.as_deref().is_some_and(|v| !v.is_empty())
        })
        .count();
    assert_eq!(compiled.params.len(), expected);
    assert_eq!(compiled.params, vec!["10", "son"]);
    assert_eq!(compiled.expr.as_ref().unwrap().param_count(), 2);
    assert_eq!(
        compiled.to_string(),
        "email == null or (age > @0 or firstName == \"\" or lastName.contains(@1) or firstName != null)"
    );
}

#[test]
fn placeholders_follow_pre_order() {
    let f = Filter::leaf("age", Operator::Gt, "1")
        .with_logic(Logic::And)
        .with_filters([
            Filter::leaf("age", Operator::Lt, "9")
                .with_logic(Logic::Or)
                .with_filters([Filter::leaf("firstName", Operator::Eq, "Ann")]),
            Filter::leaf("lastName", Operator::Neq, "Lee"),
        ]);

    let compiled = compile(&f).unwrap();
    assert_eq!(compiled.params, vec!["1", "9", "Ann", "Lee"]);
    assert_eq!(
        compiled.to_string(),
        "age > @0 and ((age < @1 or (firstName == @2)) and lastName != @3)"
    );
}

#[test]
fn unknown_operator_is_rejected() {
    for bad in ["like", "", "==", "in"] {
        let f = Filter {
            field: "age".into(),
            operator: bad.into(),
            value: Some("1".into()),
            ..Filter::default()
        };
        assert!(
            matches!(
                compile(&f),
                Err(Error::InvalidFilter(FilterError::UnknownOperator(_)))
            ),
            "operator {bad:?} should be rejected"
        );
    }
}

#[test]
fn nested_unknown_operator_is_rejected() {
    let f = Filter::leaf("age", Operator::Gt, "1")
        .with_logic(Logic::And)
        .with_filters([Filter {
            field: "age".into(),
            operator: "approximately".into(),
            ..Filter::default()
        }]);
    assert!(matches!(
        compile(&f),
        Err(Error::InvalidFilter(FilterError::UnknownOperator(_)))
    ));
}

#[test]
fn empty_field_is_rejected() {
    let f = Filter::leaf("  ", Operator::Eq, "x");
    assert_eq!(
        compile(&f),
        Err(Error::InvalidFilter(FilterError::EmptyField))
    );
}

#[test]
fn children_require_valid_logic() {
    let missing = Filter::leaf("age", Operator::Gt, "1")
        .with_filters([Filter::leaf("age", Operator::Lt, "5")]);
    assert!(matches!(
        compile(&missing),
        Err(Error::InvalidFilter(FilterError::MissingLogic { .. }))
    ));

    let mut invalid = missing.clone();
    invalid.logic = Some("xor".into());
    assert!(matches!(
        compile(&invalid),
        Err(Error::InvalidFilter(FilterError::InvalidLogic(_)))
    ));

    // logic on a leaf is ignored
    let mut leaf = Filter::leaf("age", Operator::Gt, "1");
    leaf.logic = Some("whatever".into());
    assert!(compile(&leaf).is_ok());
}

#[test]
fn unknown_field_is_rejected() {
    let f = Filter::leaf("password", Operator::Eq, "x");
    assert_eq!(
        compile(&f),
        Err(Error::InvalidFilter(FilterError::UnknownField(
            "password".into()
        )))
    );
}

#[test]
fn substring_operators_need_string_fields() {
    let f = Filter::leaf("age", Operator::Contains, "1");
    assert!(matches!(
        compile(&f),
        Err(Error::InvalidFilter(FilterError::NotAStringField { .. }))
    ));
    let f = Filter::new("score", Operator::IsEmpty);
    assert!(matches!(
        compile(&f),
        Err(Error::InvalidFilter(FilterError::NotAStringField { .. }))
    ));
}

#[test]
fn values_must_coerce_to_field_kind() {
    let f = Filter::leaf("age", Operator::Eq, "eighteen");
    assert!(matches!(
        compile(&f),
        Err(Error::InvalidFilter(FilterError::TypeMismatch { .. }))
    ));
}

#[test]
fn node_limit_is_enforced() {
    let children = (0..5).map(|i| Filter::leaf("age", Operator::Eq, i.to_string()));
    let f = Filter::leaf("age", Operator::Gt, "0")
        .with_logic(Logic::Or)
        .with_filters(children);
    let limits = CompileLimits {
        max_filter_nodes: 4,
        ..CompileLimits::default()
    };
    assert_eq!(
        compile_filter(&f, &fields(), &limits),
        Err(Error::InvalidFilter(FilterError::TooManyNodes(4)))
    );
}

#[test]
fn conjoined_filters_keep_server_params_first() {
    let server = compile(&Filter::leaf("lastName", Operator::Eq, "Tenant")).unwrap();
    let client = compile(
        &Filter::leaf("age", Operator::Gte, "18")
            .with_logic(Logic::Or)
            .with_filters([Filter::leaf("age", Operator::Eq, "7")]),
    )
    .unwrap();

    let combined = server.and(client);
    assert_eq!(combined.params, vec!["Tenant", "18", "7"]);
    assert_eq!(
        combined.to_string(),
        "lastName == @0 and (age >= @1 or (age == @2))"
    );
}

#[test]
fn dynamic_query_compiles_both_halves_or_neither() {
    let q: DynamicQuery = serde_json::from_str(
        r#"{"filter":{"field":"age","operator":"gt","value":"21"},
            "sort":[{"field":"lastName","dir":"asc"},{"field":"firstName","dir":"DESC"}]}"#,
    )
    .unwrap();
    let compiled = q.compile(&fields(), &CompileLimits::default()).unwrap();
    assert_eq!(compiled.filter.to_string(), "age > @0");
    assert_eq!(compiled.order.to_signed_tokens(), "+lastName,-firstName");

    let bad = q.clone().with_sort([Sort {
        field: "age".into(),
        dir: "up".into(),
    }]);
    assert!(matches!(
        bad.compile(&fields(), &CompileLimits::default()),
        Err(Error::InvalidSort(_))
    ));
}

#[test]
fn wire_shape_serializes_compactly() {
    let f = Filter::leaf("age", Operator::Gt, "3");
    let json = serde_json::to_value(&f).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"field": "age", "operator": "gt", "value": "3"})
    );
}
