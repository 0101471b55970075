// Resolution across imports, namespace imports, re-exports and factory modules
use pretty_assertions::assert_eq;
use schema_from_source::config::EngineConfig;
use schema_from_source::merger::SchemaEngine;
use schema_from_source::resolver::ValueRole;
use serde_json::json;
use tempfile::TempDir;

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

fn catalog_project() -> TempDir {
    let item = r#"
        import { z } from "zod";

        export const Item = z.object({
            sku: z.string(),
            qty: z.number().int().positive(),
        });

        export type ItemT = z.infer<typeof Item>;
    "#;

    let index = r#"
        export { Item as CatalogItem } from "./item";
    "#;

    let factories = r#"
        import { z } from "zod";

        export function listOf(schema: z.ZodTypeAny, max = 50) {
            const items = z.array(schema).max(max);
            return z.object({ items, count: z.number() });
        }
    "#;

    let orders = r#"
        import { z } from "zod";
        import * as f from "../lib/factories.js";
        import { CatalogItem } from "../schemas";
        import * as schemas from "../schemas/item";

        export const Order = z.object({
            main: schemas.Item,
            extra: CatalogItem.optional(),
        });

        export const ItemList = f.listOf(CatalogItem);
    "#;

    create_test_project(vec![
        ("src/schemas/item.ts", item),
        ("src/schemas/index.ts", index),
        ("src/lib/factories.ts", factories),
        ("src/api/orders.ts", orders),
    ])
}

fn expected_item_list() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "items": { "type": "array", "items": { "$ref": "#/components/schemas/Item" }, "maxItems": 50 },
            "count": { "type": "number" }
        },
        "required": ["items", "count"]
    })
}

#[test]
fn test_namespace_import_and_renamed_reexport() {
    let project = catalog_project();
    let mut engine = SchemaEngine::new(project.path(), EngineConfig::default());

    let order = engine.resolve_by_name("Order", ValueRole::Body);
    assert_eq!(
        order.to_value(),
        json!({
            "type": "object",
            "properties": {
                "main": { "$ref": "#/components/schemas/Item" },
                "extra": { "$ref": "#/components/schemas/Item" }
            },
            "required": ["main"]
        })
    );

    let table = engine.named_schemas();
    assert_eq!(
        table["Item"].to_value(),
        json!({
            "type": "object",
            "properties": {
                "sku": { "type": "string" },
                "qty": { "type": "integer", "minimum": 0, "exclusiveMinimum": true }
            },
            "required": ["sku", "qty"]
        })
    );
    assert!(!table.contains_key("CatalogItem"));
}

#[test]
fn test_factory_in_other_module_with_aliased_argument() {
    let project = catalog_project();
    let mut engine = SchemaEngine::new(project.path(), EngineConfig::default());

    let list = engine.resolve_by_name("ItemList", ValueRole::Response);
    assert_eq!(list.to_value(), expected_item_list());
    assert!(engine.named_schemas().contains_key("Item"));
}

#[test]
fn test_factory_from_generic_string_through_inferred_alias() {
    let project = catalog_project();
    let mut engine = SchemaEngine::new(project.path(), EngineConfig::default());

    let list = engine.resolve_by_name("listOf<ItemT>", ValueRole::Response);
    assert_eq!(list.to_value(), expected_item_list());
}

#[test]
fn test_inferred_type_alias_reads_validator() {
    let project = catalog_project();
    let mut engine = SchemaEngine::new(project.path(), EngineConfig::default());

    let item = engine.resolve_by_name("Item", ValueRole::Body);
    let inferred = engine.resolve_by_name("ItemT", ValueRole::Body);
    assert_eq!(inferred, item);
}

#[test]
fn test_type_cycle_across_files() {
    let project = create_test_project(vec![
        (
            "types/employee.ts",
            r#"
            import type { Dept } from "./dept";

            export interface Employee {
                name: string;
                dept?: Dept;
            }
            "#,
        ),
        (
            "types/dept.ts",
            r#"
            import type { Employee } from "./employee";

            export interface Dept {
                title: string;
                staff: Employee[];
            }
            "#,
        ),
        (
            "types/team.ts",
            r#"
            import { Employee as Staffer } from "./employee";

            export type Team = { lead: Staffer; members: Array<Staffer> };
            "#,
        ),
    ]);
    let mut engine = SchemaEngine::new(project.path(), EngineConfig::default());

    let employee = engine.resolve_by_name("Employee", ValueRole::Body);
    assert_eq!(
        employee.to_value(),
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "dept": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "staff": { "type": "array", "items": { "$ref": "#/components/schemas/Employee" } }
                    },
                    "required": ["title", "staff"]
                }
            },
            "required": ["name"]
        })
    );

    let team = engine.resolve_by_name("Team", ValueRole::Body).to_value();
    assert_eq!(team["properties"]["lead"], employee.to_value());
    assert_eq!(team["properties"]["members"]["items"], employee.to_value());

    let table = engine.named_schemas();
    let names: Vec<&String> = table.keys().collect();
    assert_eq!(names, vec!["Dept", "Employee", "Team"]);
}

#[test]
fn test_pick_and_omit_keep_required_subset() {
    let project = create_test_project(vec![(
        "account.ts",
        r#"
        export interface Account {
            id: string;
            email: string;
            password: string;
            createdAt?: string;
        }

        export type PublicAccount = Omit<Account, "password">;
        export type Credentials = Pick<Account, "email" | "password">;
        "#,
    )]);
    let mut engine = SchemaEngine::new(project.path(), EngineConfig::default());

    let public = engine.resolve_by_name("PublicAccount", ValueRole::Response).to_value();
    let names: Vec<&String> = public["properties"].as_object().unwrap().keys().collect();
    assert_eq!(names, vec!["id", "email", "createdAt"]);
    assert_eq!(public["required"], json!(["id", "email"]));

    let credentials = engine.resolve_by_name("Credentials", ValueRole::Body).to_value();
    assert_eq!(credentials["required"], json!(["email", "password"]));

    let table = engine.named_schemas();
    assert!(!table.contains_key("Account"));
    assert!(table.contains_key("PublicAccount"));
}

#[test]
fn test_unparsable_file_does_not_hide_others() {
    let project = create_test_project(vec![
        ("broken.ts", "export interface Broken { a: string"),
        ("ok.ts", "export type Id = string | number;"),
    ]);
    let mut engine = SchemaEngine::new(project.path(), EngineConfig::default());

    assert!(engine.resolve_by_name("Broken", ValueRole::Body).is_opaque());
    assert_eq!(
        engine.resolve_by_name("Id", ValueRole::Body).to_value(),
        json!({ "oneOf": [{ "type": "string" }, { "type": "number" }] })
    );
}

#[test]
fn test_wide_bigint_literal_keeps_file_available() {
    let project = create_test_project(vec![(
        "flags.ts",
        r#"
        export type Good = { a: string };
        export const MASK = 0xFFFFFFFFFFFFFFFFn;
        "#,
    )]);
    let mut engine = SchemaEngine::new(project.path(), EngineConfig::default());

    assert_eq!(
        engine.resolve_by_name("Good", ValueRole::Body).to_value(),
        json!({ "type": "object", "properties": { "a": { "type": "string" } }, "required": ["a"] })
    );
}
