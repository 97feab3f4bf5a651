//! Prompt templates. `{limit}` is replaced with the character limit the
//! extractor will enforce for the same request.

pub const FAST_INSTRUCTIONS: &str = r#"## Instructions:
1. Write ONE commit message in the format: type(scope): description
2. Keep the whole line to at most {limit} characters
3. Use present tense, imperative verbs (add, fix, remove, update)
4. Be specific about what changed; name the function, option or file area
5. No quotes, no markdown, no explanation, no second line

## Types: feat, fix, docs, style, refactor, test, chore, build, ci, perf, revert
- Prefer perf over feat when the change is about concurrency, batching, caching or speed
- Use docs when only documentation files changed
- Use build or chore for dependency and tooling updates

## Example outputs:
feat(auth): add password reset endpoint
fix(parser): handle empty input without panicking
perf(worker): parallelize job execution with a thread pool
docs: add installation steps to README
chore: bump serde to 1.0.200

Your response (commit message only):"#;

pub const DETAILED_INSTRUCTIONS: &str = r#"## Instructions:
1. Carefully analyze the code changes above, paying most attention to lines starting with '+'
2. Write ONE commit message in this exact format: type(scope): description
3. Keep it to at most {limit} characters in total, including the type and scope
4. Use present tense, imperative verbs ("add", not "added" or "adds")
5. Make the description SPECIFIC about what actually changed in the code
6. Do not end the message with a period
7. CRITICAL: follow the scope rules and type priority rules below exactly
8. Output a single line; never wrap the message in quotes, backticks or code fences

## SCOPE RULES (MANDATORY):
- The scope is the first directory name of the changed file path
- Take everything before the first '/' of the path, nothing more
- Examples: 'src/auth/login.js' -> scope = 'src'
- Examples: 'docs/api.md' -> scope = 'docs'
- Examples: 'tests/unit/helpers.py' -> scope = 'tests'
- Root level files (README.md, setup.py, Cargo.toml) -> NO scope, use the format "type: description"
- When several top-level directories changed, use the directory that holds the main change
- Never invent a scope that is not a directory in the changed paths
- Never use a file name or a file extension as the scope

## TYPE PRIORITY RULES (MANDATORY):
- perf: performance improvements. Choose perf whenever the diff is dominated by concurrency,
  parallelism, threading, thread pools, batching, caching, memoization or algorithmic speedups,
  even if the change also adds new code. perf beats feat for these changes.
- feat: a new user-visible capability (new option, command, endpoint, public function)
- fix: corrects wrong behavior, crashes, off-by-one errors, bad error handling
- refactor: restructures code without changing behavior (renames, extraction, moves)
- docs: documentation-only changes (README, guides, docstrings, comments)
- test: adds or updates tests without touching production code
- build: build system or dependency manifest changes (Cargo.toml, package.json, requirements.txt)
- ci: continuous integration configuration (workflows, pipelines)
- style: formatting, whitespace, lint-only changes with no behavior change
- chore: maintenance that does not fit any type above
- revert: reverts a previous commit
- When unsure between feat and refactor, ask whether a user can do something new; if not, use refactor
- When unsure between fix and feat, ask whether the old behavior was a bug; if so, use fix

## Types:
- feat: new features
- fix: bug fixes
- docs: documentation changes
- style: formatting, missing semicolons, etc
- refactor: code change that neither fixes a bug nor adds a feature
- test: adding missing tests
- chore: maintenance tasks; no production code change
- build: changes affecting the build system or dependencies
- ci: changes to CI configuration files and scripts
- perf: performance improvements
- revert: reverting previous commits

## Quality Guidelines:
- Lines starting with '+' show new content; lines starting with '-' show removed content
- Avoid generic phrases like 'implement features', 'update code', 'add new feature', 'various changes'
- When you see new options, commands, flags or functions, mention them by name
- Focus on the technical improvement or the business value, not on the mechanics of the edit
- Describe the most important change only; do not list every file
- Prefer concrete nouns ("retry budget", "login form") over vague ones ("logic", "stuff")
- Do not mention that the message was generated, and do not address the reader

## GOOD examples (compliant):
feat(src): add JWT token validation with expiry handling
fix(api): resolve memory leak in user session cleanup
perf(worker): parallelize job execution with a thread pool
perf(db): batch inserts to cut round trips
refactor(components): simplify button props interface
docs(docs): document the release checklist
test(tests): cover date formatting edge cases
build: bump tokio to 1.38
ci(.github): cache cargo registry between runs
chore: remove stale editor settings

## BAD examples (never produce these):
"feat: add new feature"                          -> vague, quoted
feat(login.py): add validation                   -> file name used as scope
Feat(src): Added login validation.               -> capitalized type, past tense, trailing period
feat(src): add login validation and also refactor the session store and update docs and tests
                                                 -> too long, lists everything
Here is the commit message: fix(api): handle nulls -> preamble before the message
```
fix(api): handle nulls
```                                              -> code fence around the message
feat(worker): run jobs in a ThreadPoolExecutor   -> concurrency change must use perf
<think>the user wants...</think>                 -> never output reasoning

## Worked examples (diff -> message):
Diff:
  +++ b/src/auth/login.py
  +def validate_login(user, password):
  +    if not user or not password:
  +        raise ValueError("missing credentials")
Message: feat(src): add login validation function

Diff:
  +++ b/worker.py
  -for job in jobs:
  -    run(job)
  +with ThreadPoolExecutor(max_workers=8) as pool:
  +    pool.map(run, jobs)
Message: perf: parallelize job execution

Diff:
  +++ b/api/handlers.go
  -    if len(body) > 0 {
  +    if len(body) == 0 {
  +        return ErrEmptyBody
Message: fix(api): reject empty request bodies

Diff:
  +++ b/README.md
  +## Installation
  +Run `pip install smart-commit`.
Message: docs: add installation section to README

Diff:
  +++ b/Cargo.toml
  -serde = "1.0.150"
  +serde = "1.0.200"
Message: build: bump serde to 1.0.200

Diff:
  +++ b/src/utils/strings.rs
  -fn normalise_path(p: &str) -> String {
  +fn normalize_path(p: &str) -> String {
Message: refactor(src): rename path normalization helper

Diff:
  +++ b/tests/test_parser.py
  +def test_parse_empty_string():
  +    assert parse("") == []
Message: test(tests): cover empty input in parser

Diff:
  +++ b/.github/workflows/ci.yml
  +      - uses: actions/cache@v4
Message: ci(.github): cache dependencies between runs

Diff:
  +++ b/src/cache.rs
  +static CACHE: LazyLock<Mutex<HashMap<String, Entry>>> = ...
  +    if let Some(hit) = cache.get(key) { return hit.clone(); }
Message: perf(src): memoize parsed entries in a shared cache

## Reading the diff:
- A file that only appears with '+' lines and "--- /dev/null" is new; describe what it introduces
- A file with only '-' lines was removed; describe what was dropped and why it is safe to drop
- Hunk headers (lines starting with "@@") often name the enclosing function or class; use that name
- "New directory with N files" summaries describe a whole new module; name the module, not each file
- Lock files (Cargo.lock, package-lock.json, poetry.lock) follow the manifest; describe the manifest change
- Whitespace-only or formatting-only hunks are style changes unless other hunks change behavior
- Comment-only and docstring-only hunks are docs changes unless other hunks change behavior
- Renamed files with no content change are refactor changes
- If the diff was truncated, trust the file list and the key structural changes section

## Self-check before answering:
- Does the line start with one of: feat, fix, docs, style, refactor, test, chore, build, ci, perf, revert?
- Is the scope, if any, the first directory of a changed path?
- Is there exactly one colon followed by one space after the type or scope?
- Is the description lowercase at the start and written in the imperative mood?
- Is the whole line at most {limit} characters?
- Does the message avoid quotes, backticks, markdown, reasoning and explanations?
- If concurrency, threading, batching or caching dominate the change, is the type perf?

## Your response:
Write ONLY the commit message, nothing else, at most {limit} characters:"#;

/// Render a template for a concrete limit.
pub fn render(template: &str, limit: usize) -> String {
    template.replace("{limit}", &limit.to_string())
}
