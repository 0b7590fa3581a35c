//! Fixed instruction template for consultation note extraction.
//!
//! The wording is load-bearing: the parser anchors on exactly these nine
//! headings in exactly this order, and treats "None mentioned" / "N/A" as
//! absence sentinels. Change the template and the parser together or not at
//! all.

use crate::notes::parser::SECTION_HEADINGS;

/// Build the extraction prompt with the transcript embedded verbatim.
pub fn consultation_prompt(transcript: &str) -> String {
    let headings = SECTION_HEADINGS
        .iter()
        .map(|heading| format!("{}:", heading))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a medical assistant. Analyze the following doctor's dictation \
transcript and extract the key information into a structured format. Output ONLY \
the structured information under these headings, in this exact order:\n\
{headings}\n\
\n\
Write \"None mentioned\" under any heading with no relevant information.\n\
Under Prescription, write one line per medicine in the format:\n\
Medicine Name | Dosage | Duration/Total\n\
\n\
Transcript:\n\
{transcript}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_all_headings_in_order() {
        let prompt = consultation_prompt("patient has fever");

        let mut last_position = 0;
        for heading in SECTION_HEADINGS {
            let position = prompt
                .find(&format!("{}:", heading))
                .unwrap_or_else(|| panic!("missing heading {}", heading));
            assert!(position > last_position || last_position == 0);
            last_position = position;
        }
    }

    #[test]
    fn test_prompt_embeds_transcript_verbatim() {
        let transcript = "Patient reports chest pain | radiating to left arm.";
        let prompt = consultation_prompt(transcript);
        assert!(prompt.contains(transcript));
    }

    #[test]
    fn test_prompt_specifies_absence_sentinel_and_line_format() {
        let prompt = consultation_prompt("x");
        assert!(prompt.contains("None mentioned"));
        assert!(prompt.contains("Medicine Name | Dosage | Duration/Total"));
    }
}
