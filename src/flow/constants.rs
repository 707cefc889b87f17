/// 流程相关的常量定义

/// Reserved node names, materialized on first use in an edge.
pub const START: &str = "__start__";
pub const END: &str = "__end__";

/// Reserved branch label for the fallback case.
pub const DEFAULT_CASE: &str = "__default__";

/// Flow metadata keys
pub mod metadata {
    pub const SOURCE_KIND: &str = "source_kind";
    pub const COMPILED_ON: &str = "compiled_on";

    pub const SOURCE_SDK: &str = "sdk";
    pub const SOURCE_DEFINITION: &str = "definition";
}

/// Wire document keys
pub mod fields {
    pub const SPEC: &str = "spec";
    pub const KIND: &str = "kind";
    pub const NAME: &str = "name";
    pub const DISPLAY_NAME: &str = "display_name";
    pub const DESCRIPTION: &str = "description";
    pub const INPUT_SCHEMA: &str = "input_schema";
    pub const OUTPUT_SCHEMA: &str = "output_schema";
    pub const INPUT_MAP: &str = "input_map";
    pub const METADATA: &str = "metadata";
    pub const NODES: &str = "nodes";
    pub const EDGES: &str = "edges";
    pub const SCHEMAS: &str = "schemas";

    pub const TOOL: &str = "tool";
    pub const OWNERS: &str = "owners";
    pub const EVALUATOR: &str = "evaluator";
    pub const CASES: &str = "cases";
    pub const MATCH_POLICY: &str = "match_policy";
    pub const WAIT_FOR: &str = "wait_for";
    pub const ITEM_SCHEMA: &str = "item_schema";
    pub const FOREACH_POLICY: &str = "foreach_policy";
}
