//! Built-in guideline blocks appended to follow-ups and used to seed new profiles.
//!
//! Every block starts with a newline so blocks can be concatenated directly after a
//! `----` separator line.

pub const GENERAL: &str = "
# Follow-up with `whats_next`

You don't need to output any summary after you finished a task.

Every time you finished a task given by the user, you must always run `whats_next` in the terminal verbatim(don't use +`echo`). User will type his follow-up in the terminal, and you MUST repeat that follow-up yourself, and then proceed.

You will only end the conversation when user type 'exit'. Never ask if the user would like to proceed, just do it.

Before calling `whats_next`, you must show the number of tool calls you've used so far.
";

pub const TOOL_CALL_AWARENESS: &str = "
# CRITICAL: ALWAYS show tool call count before EVERY tool call (always_applied_workspace_rules)

you *MUST* always show how many individual tool calls you've used, before making any tool call, since the session begins. Before first tool call you should show 0.
";

pub const RUNNING_COMMAND: &str = "
# Command line
When running command line like `cd some_path && do something...`, always wrap in sub shell adding enclosing `(...)`, e.g. `(cd some_path && do something...)`
";

pub const RECOVER: &str = "
# Recover from last edit

Previously I asked you to do the following work, but was interrupted. Let's resume the work. You need to first find what was done, then figure out the remaining works, and finish them.

<previous_prompt>

</previous_prompt>
";

pub const NO_TEST: &str = "
# No build or test
You don't need to add or run any build or test command
";

pub const IGNORE_LINT: &str = "
# Ignore lint errors for now
You can ignore lint error for now, I'll fix them later.
";

pub const DONT_IGNORE_LINT: &str = "
# Don't ignore lint errors
You should not ignore lint errors for now, you should fix them.
";

pub const VERIFY: &str = "
# Verify the build
You can verify swift building with `go run ./script build-swift`, You don't need to run any `go test`.
";

pub const FOLLOW_PATTERNS: &str = "
# Follow existing patterns
When changing code, you must follow existing patterns.
";

pub const SERVER_IMPLEMENTATION: &str = "
# Implement in server_go
You also need to implement this in server_go:
- server_go/src/route/router.go line xxx
- server_go/src/handler/<xxx>
- server_go/src/repo/daov2/<xxx>
- api bridge: src/api/<xxx>.ts or src/api/<xxx>/api.ts

Following patterns in server_go/doc/PATTERN.md
";

pub const GO_VERSION: &str = "
# Use correct go version
if you encounter error like: `compile: version \"go1.23.6\" does not match go tool version \"go1.24.0\"`, you can use `kool with-go1.24 go <reminder...>` to run go with the correct go version.

";

pub const DUMP_PROMPT: &str = "
# Dump the prompt to md
dump the prompt in markdown format, you need to replace three-backquote with CODE_BEGIN and CODE_END so the output is not destroyed by browser. The whole response should be wrapped in 
```md
.... 
```
";

/// Catalog order used by `show` and when seeding a new profile.
pub const CATALOG: &[&str] = &[
    GENERAL,
    TOOL_CALL_AWARENESS,
    RUNNING_COMMAND,
    NO_TEST,
    DONT_IGNORE_LINT,
    SERVER_IMPLEMENTATION,
    IGNORE_LINT,
    VERIFY,
    FOLLOW_PATTERNS,
    RECOVER,
    GO_VERSION,
    DUMP_PROMPT,
];

/// Appended to a follow-up when no profile is selected.
#[must_use]
pub fn default_guidelines() -> String {
    [GENERAL, TOOL_CALL_AWARENESS, RUNNING_COMMAND].concat()
}

/// Every catalog block without its leading newline, each followed by a blank line.
#[must_use]
pub fn catalog_text() -> String {
    let mut out = String::new();
    for block in CATALOG {
        out.push_str(block.strip_prefix('\n').unwrap_or(block));
        out.push('\n');
    }
    out
}
