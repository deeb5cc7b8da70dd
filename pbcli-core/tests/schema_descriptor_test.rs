use fixture_service::descriptor_pool;
use pbcli_core::registry::ActionRegistry;
use pbcli_core::schema::descriptor::schema_from_pool;
use pbcli_core::schema::{Operation, ParameterKind, ParameterNode, ScalarKind};


fn operation(name: &str) -> Operation {
    schema_from_pool(&descriptor_pool())
        .operations
        .into_iter()
        .find(|o| o.name == name)
        .unwrap_or_else(|| panic!("operation {name} not found"))
}

#[test]
fn test_streaming_methods_are_skipped() {
    let schema = schema_from_pool(&descriptor_pool());

    assert!(schema.operations.iter().all(|o| o.name != "watchDataCenter"));
    assert_eq!(schema.operations.len(), 5);
}

#[test]
fn test_single_message_input_becomes_a_structure() {
    let create_server = operation("createServer");

    assert_eq!(
        create_server.inputs,
        [ParameterNode::composite(
            "request",
            "ServerSpec",
            vec![
                ParameterNode::scalar("cores", ScalarKind::Int32).with_required(true),
                ParameterNode::scalar("ram", ScalarKind::Int32).with_required(true),
                ParameterNode::scalar("internetAccess", ScalarKind::Bool),
                ParameterNode::scalar("ips", ScalarKind::String).with_unbounded(true),
            ],
        )]
    );
}

#[test]
fn test_enums_keep_their_values() {
    let create_data_center = operation("createDataCenter");

    assert_eq!(
        create_data_center.inputs[1],
        ParameterNode::enumeration("region", "Region", ["EUROPE", "NORTH_AMERICA"])
    );
}

#[test]
fn test_recursive_and_map_fields_are_leaves() {
    let get_data_center = operation("getDataCenter");
    let outputs = &get_data_center.outputs;

    assert_eq!(
        outputs.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        ["dataCenterId", "dataCenterName", "region", "parent", "labels"]
    );
    assert_eq!(
        outputs[3].kind,
        ParameterKind::Scalar(ScalarKind::Json("DataCenter".to_string()))
    );
    assert_eq!(
        outputs[4].kind,
        ParameterKind::Scalar(ScalarKind::Json("map<string, string>".to_string()))
    );
}

#[test]
fn test_repeated_structures_are_unbounded() {
    let get_all = operation("getAllDataCenters");

    assert!(get_all.inputs.is_empty());
    assert_eq!(get_all.outputs.len(), 1);
    assert!(get_all.outputs[0].unbounded);
    assert_eq!(get_all.outputs[0].type_name(), "DataCenter");
    // Nested recursion stops at the first repetition of a message.
    assert_eq!(
        get_all.outputs[0].children()[3].kind,
        ParameterKind::Scalar(ScalarKind::Json("DataCenter".to_string()))
    );
}

#[test]
fn test_registry_groups_discovered_actions() {
    let registry = ActionRegistry::from_schema(schema_from_pool(&descriptor_pool())).unwrap();

    assert_eq!(
        registry.group_by_keyword("all"),
        [
            (
                "DataCenter",
                vec!["createDataCenter", "getAllDataCenters", "getDataCenter"]
            ),
            ("Server", vec!["createServer"]),
            ("Snapshot", vec!["getAllSnapshots"]),
        ]
    );
}
