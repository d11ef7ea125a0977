//! Prompt templates for every generation and recovery call the pipeline makes.

/// Phase 1: project outline as structured JSON.
pub fn outline_prompt(idea: &str, language: &str, chapter_count: usize) -> String {
    format!(
        r#"You are an expert software architect. Design a {language} application for the following idea:

"{idea}"

Break the implementation down into exactly {chapter_count} chapters. Each chapter covers one coherent part of the application (a module, a service, a configuration concern).

Return ONLY a valid JSON object with this shape, without code blocks or the ```json syntax:
{{"chapters": [{{"title": "...", "summary": "..."}}]}}

Each title must be short and file-oriented where possible; each summary must describe what the chapter implements in 2-3 sentences."#
    )
}

/// Phase 2: expand one outline chapter into an implementation description.
pub fn specification_prompt(document_context: &str, chapter_title: &str, summary: &str) -> String {
    format!(
        r#"You are an expert technical writer focusing on practical implementation details.

**Full Document Context:**
{document_context}

**Current Chapter Focus:**
- Title: "{chapter_title}"
- Original Summary: "{summary}"

**Instructions:**
1. Expand the summary for the chapter "{chapter_title}" into a detailed and comprehensive practical implementation description relevant to its title and the overall document context.
2. Include concrete actions, relevant technologies, potential challenges and configuration details related to the chapter's topic.
3. Output ONLY the final expanded text for this chapter. Do not include introductions, explanations, or formatting markers. Use clear, coherent English and standard ASCII characters."#
    )
}

/// Phase 3: source code for one chapter.
pub fn module_code_prompt(
    language: &str,
    document_context: &str,
    chapter_title: &str,
    specification: &str,
) -> String {
    format!(
        r#"You are an expert {language} developer. Write the complete source code for one file of a larger application.

**Application Context:**
{document_context}

**File to Implement:**
- Chapter: "{chapter_title}"
- Specification: {specification}

**Instructions:**
1. Produce complete, working {language} code implementing the specification.
2. Output ONLY the code. No surrounding explanations. A single fenced code block is acceptable."#
    )
}

/// Phase 3 epilogue: the authoritative ASCII project tree.
pub fn structure_tree_prompt(language: &str, chapter_titles: &[String]) -> String {
    let titles = chapter_titles
        .iter()
        .map(|t| format!("- {t}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"You are an expert {language} developer. The following files/modules were generated for a single application:

{titles}

Produce the directory tree of the project as plain text, using the standard ASCII tree notation (├──, └──, │) with one clearly named root folder. Mark directories with a trailing slash. Include every listed file, with appropriate extensions, plus any standard supporting files (e.g. a README).

Output ONLY the tree. No prose, no code fences."#
    )
}

/// QA phase: extend the project tree with conventional test files.
pub fn qa_structure_prompt(
    language: &str,
    test_type: &str,
    framework: Option<&str>,
    tree_text: &str,
) -> String {
    let framework = framework.unwrap_or("the language's default testing tools");
    format!(
        r#"You are an expert software architect specializing in testing practices. Update the existing project structure below so it also contains the directories and files needed for {test_type} tests written in {language} using {framework}.

**Existing Project Structure:**
{tree_text}

**Instructions:**
1. Determine the conventional location and naming for {test_type} test files in {language} (e.g. a tests/ directory at the root, file names like test_*.py or *.test.js). Each test file should correspond to an application file it covers.
2. Keep every original file and directory exactly where it is. Only add.
3. Output ONLY the complete updated tree, using the standard ASCII tree notation (├──, └──, │) with directories marked by a trailing slash. No prose, no code fences."#
    )
}

/// QA phase: source code for one test file.
pub fn qa_test_file_prompt(
    language: &str,
    test_type: &str,
    framework: Option<&str>,
    app_context: &str,
    updated_tree: &str,
    test_path: &str,
) -> String {
    let framework = framework.unwrap_or("the standard testing tools of the language");
    format!(
        r#"You are an expert {language} QA engineer. Write the complete code for the test file at "{test_path}". It must contain {test_type} tests written with {framework}.

**Application Code:**
{app_context}

**Full Project Structure (including tests):**
{updated_tree}

**Instructions:**
1. Test the application module the file path points at, importing it with the correct relative path per the structure above.
2. Mock external dependencies where {test_type} testing conventions call for it.
3. Output ONLY the {language} test code. No surrounding explanations. A single fenced code block is acceptable."#
    )
}

/// Correction request for text that failed JSON parsing.
pub fn json_correction_prompt(
    candidate: &str,
    parser_error: &str,
    schema_hint: Option<&str>,
    example_hint: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Please correct the following text so it becomes valid JSON. The parser reported: {parser_error}\n\n{candidate}\n"
    );
    if let Some(schema) = schema_hint {
        prompt.push_str(&format!("\nThe JSON must match this schema:\n{schema}\n"));
    }
    if let Some(example) = example_hint {
        prompt.push_str(&format!("\nExample of a valid response:\n{example}\n"));
    }
    prompt.push_str(
        "\nOnly respond with the valid JSON, without code blocks or the ```json syntax.",
    );
    prompt
}

/// Batched chapter-title to file-path mapping against an authoritative tree.
pub fn bulk_path_prompt(tree_text: &str, titles_json: &str) -> String {
    format!(
        r#"You are given the authoritative directory structure of a project and a list of code chapters. Map every chapter title to the full file path where its code should be saved.

**CRITICAL INSTRUCTIONS:**
1. All determined paths MUST align with PROJECT_STRUCTURE. If a chapter title matches an existing file in the structure, use that precise path.
2. If a chapter title implies a new file, place it in the most logical existing directory. Do NOT invent new top-level directories.
3. If a clear root folder is identifiable within PROJECT_STRUCTURE, every path must start with it.
4. Use forward slashes, no "..", no consecutive slashes, no leading or trailing slash. Infer file extensions from the structure's conventions.

**PROJECT_STRUCTURE:**
```text
{tree_text}
```

**CODE_CHAPTERS (JSON array of objects with 'chapter_title'):**
```json
{titles_json}
```

Return ONLY a valid JSON array of objects, without any other text or markdown:
[{{"original_chapter_title": "...", "determined_full_path": "..."}}]"#
    )
}

/// Single-title fallback when a chapter was missing from the bulk answer.
pub fn single_path_prompt(tree_text: &str, title: &str) -> String {
    format!(
        r#"Given the authoritative project structure below, determine the single full file path (including filename and extension) where the code for the chapter titled "{title}" should be saved. The path must align with the structure, use forward slashes, and contain no ".." and no leading or trailing slash.

**PROJECT_STRUCTURE:**
```text
{tree_text}
```

Respond with ONLY the path, nothing else."#
    )
}
