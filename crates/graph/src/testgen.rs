use serde::{Deserialize, Serialize};

/// One generated pytest skeleton
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSkeleton {
    pub name: String,
    pub code: String,
    /// Template used: "unit", "edge_case", "exception", "init", "method"
    pub kind: String,
}

/// Parameter names suggesting numeric inputs
const NUMERIC_HINTS: &[&str] = &["num", "count", "size", "length", "index", "id", "age", "amount"];

/// Generate pytest skeletons for a function-like unit.
pub(crate) fn function_skeletons(
    name: &str,
    params: &[String],
    has_exception_handling: bool,
) -> Vec<TestSkeleton> {
    let mut skeletons = Vec::new();

    let args = params.join(", ");
    let assignments = params
        .iter()
        .map(|p| format!("    {p} = {}", infer_value(p)))
        .collect::<Vec<_>>()
        .join("\n");

    skeletons.push(TestSkeleton {
        name: format!("test_{name}_basic"),
        kind: "unit".to_string(),
        code: format!(
            "def test_{name}_basic():\n{assignments}{}\n    result = {name}({args})\n    assert result is not None\n",
            if assignments.is_empty() { "" } else { "\n" }
        ),
    });

    if params.iter().any(|p| looks_numeric(p)) {
        let zeros = params
            .iter()
            .map(|p| if looks_numeric(p) { "0" } else { "\"\"" })
            .collect::<Vec<_>>()
            .join(", ");
        skeletons.push(TestSkeleton {
            name: format!("test_{name}_edge_cases"),
            kind: "edge_case".to_string(),
            code: format!(
                "def test_{name}_edge_cases():\n    result = {name}({zeros})\n    assert result is not None or True\n"
            ),
        });
    }

    if has_exception_handling {
        skeletons.push(TestSkeleton {
            name: format!("test_{name}_exceptions"),
            kind: "exception".to_string(),
            code: format!(
                "def test_{name}_exceptions():\n    with pytest.raises((ValueError, TypeError, Exception)):\n        {name}(None)\n"
            ),
        });
    }

    skeletons
}

/// Generate pytest skeletons for a class: construction plus one per public
/// method.
pub(crate) fn class_skeletons(name: &str, public_methods: &[String]) -> Vec<TestSkeleton> {
    let mut skeletons = vec![TestSkeleton {
        name: format!("test_{name}_initialization"),
        kind: "init".to_string(),
        code: format!(
            "def test_{name}_initialization():\n    instance = {name}()\n    assert isinstance(instance, {name})\n"
        ),
    }];

    for method in public_methods {
        skeletons.push(TestSkeleton {
            name: format!("test_{name}_{method}"),
            kind: "method".to_string(),
            code: format!(
                "def test_{name}_{method}():\n    instance = {name}()\n    result = instance.{method}()\n    assert result is not None or True\n"
            ),
        });
    }

    skeletons
}

fn looks_numeric(param: &str) -> bool {
    let lowered = param.to_lowercase();
    NUMERIC_HINTS.iter().any(|hint| lowered.contains(hint))
}

/// Infer a plausible test value from a parameter name.
fn infer_value(param: &str) -> &'static str {
    let lowered = param.to_lowercase();
    if ["str", "text", "name", "message"]
        .iter()
        .any(|h| lowered.contains(h))
    {
        "\"test_value\""
    } else if looks_numeric(&lowered) {
        "1"
    } else if ["flag", "is_", "has_", "should_"]
        .iter()
        .any(|h| lowered.contains(h))
    {
        "True"
    } else if ["list", "items", "elements"]
        .iter()
        .any(|h| lowered.contains(h))
    {
        "[]"
    } else if ["dict", "config", "options"]
        .iter()
        .any(|h| lowered.contains(h))
    {
        "{}"
    } else {
        "None"
    }
}
