use std::fmt::Display;

/// Prompt sent once so the hosted model accepts further workloads.
pub const CONSENT_PROMPT: &str = "agree";

pub const OCR_PROMPT: &str = "Extract all text from this manga image. Return the text in Japanese.";

pub const NOVEL_PROMPT: &str = "You are an accomplished Japanese novelist adapting a manga page into a novel. \
Write the scene shown in this image as novel prose, following these rules:
1. Write entirely in natural, literary Japanese.
2. Show, don't tell. Convey emotions through actions, expressions, gestures and surroundings instead of naming them.
3. Keep every line of dialogue that appears in the image, in the same order, inside Japanese quotation marks 「」, and attribute it to the right character.
4. Translate manga visual conventions into narrative description instead of mentioning them:
   - sweat drops become nervousness, a cold sweat running down the back, or an awkward pause;
   - anger veins (cross-shaped marks) become a tightening jaw, a trembling voice or barely contained irritation;
   - shock lines and speed lines become a sudden jolt, a held breath, or the world seeming to freeze;
   - sparkles and flowers in the background become warmth, admiration or a softened atmosphere;
   - sound effects become the sounds themselves, described in prose.
5. Follow the reading order of the page, right to left and top to bottom.
6. Do not invent events that contradict the image, and do not add commentary, headings or explanations. Output only the prose.";

pub const ORIGINAL_NOVEL_PROMPT: &str = "You are the original author of the novel that this manga page was adapted from. \
The prose you wrote came first; the artist later turned it into the image you are looking at. \
Reconstruct, in Japanese, the passage of your original novel that this scene was drawn from.
Rules:
- Write as the author of a literary novel, never as someone describing a picture.
- Never mention panels, frames, speech bubbles, pages, drawings, artwork, manga, comics or anything else belonging to the comic medium.
- Keep the dialogue visible in the scene, in Japanese quotation marks 「」, woven naturally into the narration.
- Add sensory detail the image cannot show: smells, temperature, textures, ambient sounds, the weight of silence, and the characters' inner thoughts.
- Give the passage the rhythm of finished literary prose, with varied sentence length and a consistent point of view.
- Output only the novel text, with no title, preface or explanation.";

/// The image-bearing tasks, one per route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    ExtractText,
    NovelizeFaithful,
    NovelizeOriginal,
}

impl Task {
    pub const ALL: [Task; 3] = [Task::ExtractText, Task::NovelizeFaithful, Task::NovelizeOriginal];

    pub fn prompt(self) -> &'static str {
        match self {
            Task::ExtractText => OCR_PROMPT,
            Task::NovelizeFaithful => NOVEL_PROMPT,
            Task::NovelizeOriginal => ORIGINAL_NOVEL_PROMPT,
        }
    }

    pub fn route(self) -> &'static str {
        match self {
            Task::ExtractText => "/ocr",
            Task::NovelizeFaithful => "/novel",
            Task::NovelizeOriginal => "/original-novel",
        }
    }
}

impl Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::ExtractText => write!(f, "extract-text"),
            Task::NovelizeFaithful => write!(f, "novelize-faithful"),
            Task::NovelizeOriginal => write!(f, "novelize-original"),
        }
    }
}
