//! A single input text may hold several independent units separated by
//! lines consisting of `--`.

/// One independently compiled unit of an input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    /// 1-based position in the input.
    pub index: usize,
    /// 1-based line of the input where the case text starts.
    pub first_line: usize,
    pub text: String,
}

pub const SEPARATOR: &str = "--";

/// Splits `text` into cases. Cases holding only whitespace are dropped.
pub fn split_cases(text: &str) -> Vec<Case> {
    let mut cases = Vec::new();
    let mut current = String::new();
    let mut first_line = 1;
    for (number, line) in text.lines().enumerate() {
        if line == SEPARATOR {
            push_case(&mut cases, &mut current, first_line);
            first_line = number + 2;
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    push_case(&mut cases, &mut current, first_line);
    cases
}

fn push_case(cases: &mut Vec<Case>, current: &mut String, first_line: usize) {
    let text = std::mem::take(current);
    if text.trim().is_empty() {
        return;
    }
    cases.push(Case {
        index: cases.len() + 1,
        first_line,
        text,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_case_without_separator() {
        let cases = split_cases("{}\n");
        assert_eq!(
            cases,
            vec![Case {
                index: 1,
                first_line: 1,
                text: "{}\n".into()
            }]
        );
    }

    #[test]
    fn separators_split_and_track_lines() {
        let cases = split_cases("{\"a\": 1}\n--\n\n{\n}\n--\n");
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].index, 2);
        assert_eq!(cases[1].first_line, 3);
        assert_eq!(cases[1].text, "\n{\n}\n");
    }

    #[test]
    fn dashes_inside_a_line_do_not_split() {
        let cases = split_cases("{\"x\": \"--\"}\n -- \n");
        assert_eq!(cases.len(), 1);
    }

    #[test]
    fn only_a_bare_separator_splits() {
        let cases = split_cases("{}\n-- \n{}\n--\t\n{}\n");
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].text, "{}\n-- \n{}\n--\t\n{}\n");

        let cases = split_cases("{}\r\n--\r\n[]\r\n");
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].first_line, 3);
        assert_eq!(cases[1].text, "[]\n");
    }
}
