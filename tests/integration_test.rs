use pretty_assertions::assert_eq;
use schema_from_source::{
    config::EngineConfig,
    merger::SchemaEngine,
    operation::load_operations,
    resolver::ValueRole,
    serializer::{load_override_document, serialize_json, serialize_yaml, Components, SchemaDocument},
};
use serde_json::json;
use tempfile::TempDir;

/// Helper function to create a temporary test project
fn create_test_project(files: Vec<(&str, &str)>) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    for (path, content) in files {
        let file_path = temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&file_path, content).expect("Failed to write test file");
    }

    temp_dir
}

/// The shop fixture: native types, validator schemas, a factory and an ORM helper
fn create_shop_project() -> TempDir {
    create_test_project(vec![
        ("src/types/common.ts", include_str!("fixtures/shop/src/types/common.ts")),
        ("src/types/index.ts", include_str!("fixtures/shop/src/types/index.ts")),
        ("src/types/query.ts", include_str!("fixtures/shop/src/types/query.ts")),
        ("src/models/user.ts", include_str!("fixtures/shop/src/models/user.ts")),
        ("src/schemas/product.ts", include_str!("fixtures/shop/src/schemas/product.ts")),
        ("src/schemas/page.ts", include_str!("fixtures/shop/src/schemas/page.ts")),
        ("src/schemas/insert.ts", include_str!("fixtures/shop/src/schemas/insert.ts")),
        ("src/db/tables.ts", include_str!("fixtures/shop/src/db/tables.ts")),
        ("overrides.yaml", include_str!("fixtures/shop/overrides.yaml")),
        ("operations.yaml", include_str!("fixtures/shop/operations.yaml")),
    ])
}

fn shop_engine(project: &TempDir) -> SchemaEngine {
    SchemaEngine::new(project.path(), EngineConfig::default())
}

#[test]
fn test_interface_with_parent_cycle_and_optionality() {
    let project = create_shop_project();
    let mut engine = shop_engine(&project);

    let user = engine.resolve_by_name("User", ValueRole::Body);
    assert_eq!(
        user.to_value(),
        json!({
            "type": "object",
            "description": "A registered customer",
            "properties": {
                "createdAt": { "type": "string" },
                "updatedAt": { "type": "string" },
                "id": { "type": "number" },
                "email": { "type": "string" },
                "nickname": { "type": "string", "nullable": true },
                "bio": { "type": "string", "nullable": true },
                "role": { "type": "string", "enum": ["admin", "member"] },
                "meta": { "type": "object", "additionalProperties": { "type": "string" } },
                "friends": { "type": "array", "items": { "$ref": "#/components/schemas/User" } }
            },
            "required": ["createdAt", "id", "email", "nickname", "role", "meta", "friends"]
        })
    );

    let table = engine.named_schemas();
    assert_eq!(table["User"], user);
    assert_eq!(table["Timestamps"].to_value()["description"], json!("Audit timestamps"));
}

#[test]
fn test_resolution_is_idempotent() {
    let project = create_shop_project();
    let mut engine = shop_engine(&project);

    let first = engine.resolve_by_name("ProductUpdate", ValueRole::Body);
    let first_table = engine.named_schemas();
    let second = engine.resolve_by_name("ProductUpdate", ValueRole::Body);
    let second_table = engine.named_schemas();

    assert_eq!(first, second);
    assert_eq!(first_table, second_table);
}

#[test]
fn test_validator_object_modifiers() {
    let project = create_shop_project();
    let mut engine = shop_engine(&project);

    let product = engine.resolve_by_name("Product", ValueRole::Body);
    assert_eq!(
        product.to_value(),
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "format": "uuid" },
                "name": { "type": "string", "minLength": 1, "maxLength": 120 },
                "price": { "$ref": "#/components/schemas/Price" },
                "tags": { "type": "array", "items": { "type": "string" }, "default": [] },
                "discontinued": { "type": "boolean" },
                "description": { "type": "string", "nullable": true }
            },
            "required": ["id", "name", "price", "tags"]
        })
    );

    let table = engine.named_schemas();
    assert_eq!(
        table["Price"].to_value(),
        json!({
            "type": "object",
            "properties": {
                "amount": { "type": "number", "minimum": 0 },
                "currency": { "type": "string", "enum": ["EUR", "USD"] }
            },
            "required": ["amount", "currency"]
        })
    );
}

#[test]
fn test_partial_then_extend_requires_only_extension() {
    let project = create_shop_project();
    let mut engine = shop_engine(&project);

    let update = engine.resolve_by_name("ProductUpdate", ValueRole::Body).to_value();
    assert_eq!(update["required"], json!(["id"]));
    let names: Vec<&String> = update["properties"].as_object().unwrap().keys().collect();
    assert_eq!(names, vec!["id", "name", "price", "tags", "discontinued", "description"]);
}

#[test]
fn test_factory_call_expands_with_reference_argument() {
    let project = create_shop_project();
    let mut engine = shop_engine(&project);

    let page = engine.resolve_by_name("ProductPage", ValueRole::Response);
    assert_eq!(
        page.to_value(),
        json!({
            "type": "object",
            "properties": {
                "items": { "type": "array", "items": { "$ref": "#/components/schemas/Product" } },
                "total": { "type": "integer" }
            },
            "required": ["items", "total"]
        })
    );

    let table = engine.named_schemas();
    assert!(table.contains_key("Product"));
    assert!(table.contains_key("Price"));
    assert!(!table.contains_key("paginated"));
}

#[test]
fn test_factory_instantiated_from_generic_string() {
    let project = create_shop_project();
    let mut engine = shop_engine(&project);

    let by_call = engine.resolve_by_name("ProductPage", ValueRole::Body);
    let by_name = engine.resolve_by_name("paginated<Product>", ValueRole::Body);
    assert_eq!(by_name, by_call);
}

#[test]
fn test_generic_type_instantiation() {
    let project = create_shop_project();
    let mut engine = shop_engine(&project);

    let page = engine.resolve_by_name("Page<User>", ValueRole::Response);
    assert_eq!(
        page.to_value(),
        json!({
            "type": "object",
            "properties": {
                "items": { "type": "array", "items": { "$ref": "#/components/schemas/User" } },
                "next": { "type": "string", "nullable": true }
            },
            "required": ["items", "next"]
        })
    );

    let table = engine.named_schemas();
    assert!(table.contains_key("User"));
    assert!(!table.contains_key("Page"));
    assert!(!table.contains_key("T"));
}

#[test]
fn test_discriminated_type_union_and_enum() {
    let project = create_shop_project();
    let mut engine = shop_engine(&project);

    let shape = engine.resolve_by_name("Shape", ValueRole::Body).to_value();
    assert_eq!(shape["discriminator"], json!({ "propertyName": "kind" }));
    assert_eq!(shape["oneOf"][0]["properties"]["kind"], json!({ "type": "string", "enum": ["circle"] }));
    assert_eq!(shape["oneOf"][1]["required"], json!(["kind", "side"]));

    let currency = engine.resolve_by_name("Currency", ValueRole::Body);
    assert_eq!(currency.to_value(), json!({ "type": "string", "enum": ["EUR", "USD"] }));
}

#[test]
fn test_orm_helper_refinements() {
    let project = create_shop_project();
    let mut engine = shop_engine(&project);

    let insert = engine.resolve_by_name("InsertAccount", ValueRole::Body);
    assert_eq!(
        insert.to_value(),
        json!({
            "type": "object",
            "properties": {
                "email": { "type": "string", "format": "email" },
                "displayName": { "type": "string", "maxLength": 64 },
                "isAdmin": { "type": "boolean", "default": false }
            },
            "required": ["email", "isAdmin"]
        })
    );
}

#[test]
fn test_override_replaces_layers_verbatim() {
    let project = create_shop_project();
    let mut engine = shop_engine(&project);
    let overrides = load_override_document(&project.path().join("overrides.yaml")).unwrap();
    engine.add_overrides(overrides);

    let price = engine.resolve_by_name("Price", ValueRole::Body);
    assert_eq!(price.to_value(), json!({ "type": "string", "pattern": "^[0-9]+\\.[0-9]{2}$" }));

    let product = engine.resolve_by_name("Product", ValueRole::Body).to_value();
    assert_eq!(product["properties"]["price"], json!({ "$ref": "#/components/schemas/Price" }));

    let table = engine.named_schemas();
    assert_eq!(table["Price"], price);
}

#[test]
fn test_operations_apply_roles() {
    let project = create_shop_project();
    let mut engine = shop_engine(&project);
    let records = load_operations(&project.path().join("operations.yaml")).unwrap();
    let resolved: Vec<_> = records.iter().map(|record| engine.resolve_operation(record)).collect();

    assert_eq!(resolved[0].operation_id, "listProducts");
    assert_eq!(
        resolved[0].query.as_ref().unwrap().to_value(),
        json!({
            "type": "object",
            "properties": { "search": { "type": "string" }, "limit": { "type": "number" } }
        })
    );
    assert_eq!(resolved[0].responses["200"].to_value()["properties"]["total"], json!({ "type": "integer" }));

    assert_eq!(resolved[1].path.as_ref().unwrap().to_value()["required"], json!(["id"]));
    assert_eq!(resolved[1].body.as_ref().unwrap().to_value()["required"], json!(["id"]));
    assert!(resolved[1].responses["404"].is_opaque());
}

#[test]
fn test_exported_declarations_fill_table() {
    let project = create_shop_project();
    let mut engine = shop_engine(&project);

    assert_eq!(engine.resolve_exported(), 12);
    let names: Vec<String> = engine.named_schemas().keys().cloned().collect();
    assert_eq!(
        names,
        vec![
            "Currency",
            "InsertAccount",
            "Meta",
            "Price",
            "Product",
            "ProductPage",
            "ProductParams",
            "ProductQuery",
            "ProductUpdate",
            "Shape",
            "Timestamps",
            "User",
        ]
    );
}

#[test]
fn test_reruns_are_byte_identical() {
    let project = create_shop_project();

    let render = || {
        let mut engine = shop_engine(&project);
        let mut document = SchemaDocument::default();
        document
            .requested
            .insert("Page<User>".to_string(), engine.resolve_by_name("Page<User>", ValueRole::Response));
        engine.resolve_exported();
        document.components = Components {
            schemas: engine.named_schemas(),
        };
        (serialize_yaml(&document).unwrap(), serialize_json(&document).unwrap())
    };

    let (first_yaml, first_json) = render();
    let (second_yaml, second_json) = render();
    assert_eq!(first_yaml, second_yaml);
    assert_eq!(first_json, second_json);
    assert!(first_yaml.contains("Page<User>"));
}

#[test]
fn test_extending_twice_keeps_required_names_once() {
    let project = create_test_project(vec![(
        "src/schemas/account.ts",
        r#"
        import { z } from "zod";

        export const Account = z.object({ id: z.string(), email: z.string().email() });
        export const Profile = Account.extend({ id: z.string().uuid(), bio: z.string().optional() })
            .extend({ id: z.string().uuid(), handle: z.string() });
        "#,
    )]);
    let mut engine = SchemaEngine::new(project.path(), EngineConfig::default());

    let profile = engine.resolve_by_name("Profile", ValueRole::Body).to_value();
    assert_eq!(profile["required"], json!(["id", "email", "handle"]));
    let names: Vec<&String> = profile["properties"].as_object().unwrap().keys().collect();
    assert_eq!(names, vec!["id", "email", "bio", "handle"]);
}
