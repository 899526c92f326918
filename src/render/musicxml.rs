use super::{
    layout_measures, note_values, RenderError, RenderFormat, RenderRequest, RenderedScore,
    ScoreRenderer, Segment,
};
use crate::music::{octave, pitch_class, Clef, Score};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

pub const MUSICXML_MEDIA_TYPE: &str = "application/vnd.recordare.musicxml+xml";

/// Sixteenth notes per quarter, the MusicXML `<divisions>` value.
const DIVISIONS: u32 = 4;

/// Partwise MusicXML for a single saxophone part.
///
/// The document is staged in a named temporary file inside `scratch_dir`,
/// read back, and the file is removed.
#[derive(Debug, Clone)]
pub struct MusicXmlRenderer {
    scratch_dir: PathBuf,
}

impl MusicXmlRenderer {
    pub fn new(scratch_dir: PathBuf) -> Self {
        Self { scratch_dir }
    }

    fn document(&self, score: &Score, request: &RenderRequest) -> Result<String, RenderError> {
        let measures = layout_measures(score)?;
        let time = score.time_signature();
        let (clef_sign, clef_line) = match score.clef() {
            Clef::Treble => ("G", 2),
        };

        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n");
        xml.push_str("<!DOCTYPE score-partwise PUBLIC \"-//Recordare//DTD MusicXML 3.1 Partwise//EN\" \"http://www.musicxml.org/dtds/partwise.dtd\">\n");
        xml.push_str("<score-partwise version=\"3.1\">\n");
        xml.push_str(&format!(
            "  <work><work-title>{}</work-title></work>\n",
            escape_xml(&request.title)
        ));
        xml.push_str("  <part-list>\n    <score-part id=\"P1\"><part-name>Saxophone</part-name></score-part>\n  </part-list>\n");
        xml.push_str("  <part id=\"P1\">\n");

        for (index, measure) in measures.iter().enumerate() {
            xml.push_str(&format!("    <measure number=\"{}\">\n", index + 1));
            if index == 0 {
                xml.push_str(&format!(
                    "      <attributes><divisions>{}</divisions><key><fifths>{}</fifths></key><time><beats>{}</beats><beat-type>{}</beat-type></time><clef><sign>{}</sign><line>{}</line></clef></attributes>\n",
                    DIVISIONS,
                    request.key.fifths(),
                    time.beats,
                    time.beat_type,
                    clef_sign,
                    clef_line
                ));
            }
            for segment in measure {
                push_segment(&mut xml, segment, request);
            }
            xml.push_str("    </measure>\n");
        }

        xml.push_str("  </part>\n</score-partwise>\n");
        Ok(xml)
    }
}

impl ScoreRenderer for MusicXmlRenderer {
    fn format(&self) -> RenderFormat {
        RenderFormat::MusicXml
    }

    fn render(&self, score: &Score, request: &RenderRequest) -> Result<RenderedScore, RenderError> {
        let document = self.document(score, request)?;

        std::fs::create_dir_all(&self.scratch_dir)?;
        let mut staged = tempfile::Builder::new()
            .prefix("score-")
            .suffix(".musicxml")
            .tempfile_in(&self.scratch_dir)?;
        staged.write_all(document.as_bytes())?;
        staged.flush()?;
        let bytes = std::fs::read(staged.path())?;
        debug!(
            "Rendered {} bytes of MusicXML via {:?}",
            bytes.len(),
            staged.path()
        );

        Ok(RenderedScore {
            media_type: MUSICXML_MEDIA_TYPE,
            bytes,
        })
    }
}

fn push_segment(xml: &mut String, segment: &Segment, request: &RenderRequest) {
    let values = note_values(segment.units);
    let last = values.len() - 1;
    for (index, (length, note_type, dotted)) in values.into_iter().enumerate() {
        let tie_stop = segment.tie_stop || index > 0;
        let tie_start = segment.tie_start || index < last;

        xml.push_str("      <note>");
        match segment.pitch {
            None => xml.push_str("<rest/>"),
            Some(pitch) => {
                let (step, accidental) = request.key.spelling().spell(pitch_class(pitch));
                xml.push_str(&format!("<pitch><step>{}</step>", step));
                if accidental.alter() != 0 {
                    xml.push_str(&format!("<alter>{}</alter>", accidental.alter()));
                }
                xml.push_str(&format!("<octave>{}</octave></pitch>", octave(pitch)));
            }
        }
        xml.push_str(&format!("<duration>{}</duration>", length));
        if tie_stop {
            xml.push_str("<tie type=\"stop\"/>");
        }
        if tie_start {
            xml.push_str("<tie type=\"start\"/>");
        }
        xml.push_str(&format!("<type>{}</type>", note_type));
        if dotted {
            xml.push_str("<dot/>");
        }
        if tie_start || tie_stop {
            xml.push_str("<notations>");
            if tie_stop {
                xml.push_str("<tied type=\"stop\"/>");
            }
            if tie_start {
                xml.push_str("<tied type=\"start\"/>");
            }
            xml.push_str("</notations>");
        }
        xml.push_str("</note>\n");
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
