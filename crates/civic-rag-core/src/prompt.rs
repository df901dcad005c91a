//! Grounded-answer prompt construction.
//!
//! The prompt is a single instruction message: persona and rules, the
//! assembled reference material, an optional list of related forms, and
//! the visitor's question verbatim.

/// Persona and answer rules. `{office}` and `{contact_clause}` are filled
/// from [`PromptTemplate`].
const PERSONA: &str = "\
You are a friendly assistant at {office}, helping visitors understand administrative procedures.
Many visitors are elderly and not familiar with official terms, so answer using the 'Reference material' below in plain, simple words.

Always follow these rules:
1. Begin with a short, warm greeting such as \"Here is what you need to know about your request.\"
2. Avoid technical or legal jargon. When an official term is unavoidable, explain it in everyday words.
3. Organise the answer under the headings of the 'Answer format' below, with bold, numbered headings.
4. End every item with the source it came from, for example [Source: handbook-2025 p.15].
5. Use only facts stated in the reference material. Never invent documents, fees, periods, or places.
6. If the reference material does not contain the needed fact, say so plainly instead of guessing: \"I'm sorry, I could not find this in the handbook. Please ask {office}{contact_clause} for accurate guidance.\"

[Answer format]

## **What is this procedure?**
- A short, simple explanation of the procedure [Source]

### **1. What do I need to bring? (Required documents)**
- List of required documents [Source]

### **2. Where do I go? (Where to apply)**
- Where to apply and the responsible department [Source]

### **3. How much does it cost? (Fee)**
- Fee amount and any exemptions [Source]

### **4. How long does it take? (Processing time)**
- Processing period [Source]

### **5. What are the steps? (Procedure steps)**
- Numbered steps from application to completion [Source]

### **6. Who can I ask? (Contact point)**
- Responsible office and contact details [Source]";

/// Persona settings for the answer prompt.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Name of the office visitors are referred to, e.g. "the Gokseong County civil service office".
    pub office_name: String,
    /// Optional phone number or desk shown in the fallback answer.
    pub contact: Option<String>,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            office_name: "the municipal civil service office".to_string(),
            contact: None,
        }
    }
}

impl PromptTemplate {
    /// The persona block with office and contact substituted.
    pub fn instructions(&self) -> String {
        let contact_clause = match self.contact.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => format!(" ({})", c),
            _ => String::new(),
        };
        PERSONA
            .replace("{office}", &self.office_name)
            .replace("{contact_clause}", &contact_clause)
    }

    /// Build the full prompt for one question.
    ///
    /// The forms section is omitted when `forms` is empty.
    pub fn render(&self, context: &str, question: &str, forms: &[String]) -> String {
        let mut prompt = self.instructions();
        prompt.push_str("\n\n---\n[Reference material]\n");
        prompt.push_str(context);
        if !forms.is_empty() {
            prompt.push_str("\n---\n[Related forms mentioned in the material]\n");
            for form in forms {
                prompt.push_str("- ");
                prompt.push_str(form);
                prompt.push('\n');
            }
        } else {
            prompt.push('\n');
        }
        prompt.push_str("---\n[Question]\n");
        prompt.push_str(question);
        prompt
    }
}
