use crate::ui::markdown::{render_blocks, Block, StyledSpan};

#[test]
fn rendering_is_repeatable() {
    let text = "# Title\n| A | B |\n|---|---|\n| 1 | 2 |\n```\nunterminated";
    assert_eq!(render_blocks(text), render_blocks(text));
}

#[test]
fn headings_count_leading_hashes() {
    assert_eq!(render_blocks("## Title"), vec![Block::heading(2, "Title")]);
    assert_eq!(render_blocks("#"), vec![Block::heading(1, "")]);
    assert_eq!(render_blocks("###   spaced  "), vec![Block::heading(3, "spaced")]);
}

#[test]
fn indented_heading_is_still_a_heading() {
    assert_eq!(render_blocks("   # Indented"), vec![Block::heading(1, "Indented")]);
}

#[test]
fn heading_text_is_inline_parsed() {
    let blocks = render_blocks("# A **bold** claim");
    let Block::Heading { level, text } = &blocks[0] else {
        panic!("expected heading, got {:?}", blocks[0]);
    };
    assert_eq!(*level, 1);
    assert!(text.spans.contains(&StyledSpan::Bold("bold".into())));
}

#[test]
fn list_items_need_marker_then_whitespace() {
    assert_eq!(
        render_blocks("* first\n- second\n*not a list*\n-dash"),
        vec![
            Block::list_item("first"),
            Block::list_item("second"),
            Block::paragraph("*not a list*"),
            Block::paragraph("-dash"),
        ]
    );
}

#[test]
fn indented_list_marker_is_a_paragraph() {
    assert_eq!(render_blocks("  - nested"), vec![Block::paragraph("  - nested")]);
}

#[test]
fn paragraphs_keep_the_untrimmed_line() {
    let blocks = render_blocks("  leading space");
    assert_eq!(blocks, vec![Block::paragraph("  leading space")]);
}

#[test]
fn blank_lines_become_blank_blocks() {
    assert_eq!(
        render_blocks("one\n\n   \ntwo"),
        vec![
            Block::paragraph("one"),
            Block::BlankLine,
            Block::BlankLine,
            Block::paragraph("two"),
        ]
    );
}

#[test]
fn empty_text_is_one_blank_line() {
    assert_eq!(render_blocks(""), vec![Block::BlankLine]);
}

#[test]
fn fenced_code_yields_only_code_lines() {
    assert_eq!(render_blocks("```\nx\n```"), vec![Block::CodeLine("x".into())]);
}

#[test]
fn code_lines_are_raw_and_unparsed() {
    let blocks = render_blocks("```rust\n    let **x** = 1;\n# not a heading\n| no | table |\n```");
    assert_eq!(
        blocks,
        vec![
            Block::CodeLine("    let **x** = 1;".into()),
            Block::CodeLine("# not a heading".into()),
            Block::CodeLine("| no | table |".into()),
        ]
    );
}

#[test]
fn unterminated_fence_swallows_the_rest() {
    let blocks = render_blocks("intro\n```\nalpha\n\n# beta");
    assert_eq!(
        blocks,
        vec![
            Block::paragraph("intro"),
            Block::CodeLine("alpha".into()),
            Block::CodeLine(String::new()),
            Block::CodeLine("# beta".into()),
        ]
    );
}

#[test]
fn trailing_newline_adds_blank_block() {
    assert_eq!(
        render_blocks("done\n"),
        vec![Block::paragraph("done"), Block::BlankLine]
    );
}

#[test]
fn arbitrary_text_never_panics() {
    let samples = [
        "|",
        "||\n||",
        "```",
        "```\n```\n```",
        "#####",
        "* ",
        "- \u{2028}",
        "| a |\n```\n| b |",
        "\r\n\r\n",
        "ñ|ñ\n|ñ|",
    ];
    for sample in samples {
        let _ = render_blocks(sample);
    }
}
