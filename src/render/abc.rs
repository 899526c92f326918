use super::{
    layout_measures, note_values, RenderError, RenderFormat, RenderRequest, RenderedScore,
    ScoreRenderer, Segment,
};
use crate::music::{octave, pitch_class, Accidental, Clef, Score, Spelling};
use std::collections::HashMap;

pub const ABC_MEDIA_TYPE: &str = "text/vnd.abc";

const MEASURES_PER_LINE: usize = 4;

/// Plain-text ABC notation with a sixteenth-note unit length.
///
/// The tune is written against `K:C`, so every black key carries an explicit
/// accidental. An accidental holds until the end of its bar, a later note of
/// the same letter and octave with a different alteration gets its own sign.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbcRenderer;

impl ScoreRenderer for AbcRenderer {
    fn format(&self) -> RenderFormat {
        RenderFormat::Abc
    }

    fn render(&self, score: &Score, request: &RenderRequest) -> Result<RenderedScore, RenderError> {
        let measures = layout_measures(score)?;
        let time = score.time_signature();
        let clef = match score.clef() {
            Clef::Treble => "treble",
        };

        let mut abc = String::new();
        abc.push_str("X:1\n");
        abc.push_str(&format!("T:{}\n", single_line(&request.title)));
        abc.push_str(&format!("T:({})\n", request.key));
        abc.push_str(&format!("M:{}/{}\n", time.beats, time.beat_type));
        abc.push_str("L:1/16\n");
        abc.push_str(&format!("K:C clef={}\n", clef));

        let spelling = request.key.spelling();
        let last = measures.len() - 1;
        for (index, measure) in measures.iter().enumerate() {
            let mut bar_alterations: HashMap<(char, i32), Accidental> = HashMap::new();
            let tokens: Vec<String> = measure
                .iter()
                .map(|segment| segment_token(segment, spelling, &mut bar_alterations))
                .collect();
            abc.push_str(&tokens.join(" "));
            if index == last {
                abc.push_str(" |]\n");
            } else if (index + 1) % MEASURES_PER_LINE == 0 {
                abc.push_str(" |\n");
            } else {
                abc.push_str(" | ");
            }
        }

        Ok(RenderedScore {
            media_type: ABC_MEDIA_TYPE,
            bytes: abc.into_bytes(),
        })
    }
}

fn single_line(text: &str) -> String {
    text.lines().collect::<Vec<_>>().join(" ")
}

/// ABC for one segment. Lengths without a single note head are split into
/// tied notes (`A4-A`) or consecutive rests (`z4 z`).
fn segment_token(
    segment: &Segment,
    spelling: Spelling,
    bar_alterations: &mut HashMap<(char, i32), Accidental>,
) -> String {
    let (first, rest, separator) = match segment.pitch {
        None => ("z".to_string(), "z".to_string(), " "),
        Some(pitch) => {
            let (letter, accidental) = spelling.spell(pitch_class(pitch));
            let octave = octave(pitch);
            let name = note_name(letter, octave);
            let in_effect = bar_alterations
                .get(&(letter, octave))
                .copied()
                .unwrap_or(Accidental::Natural);
            let mut first = String::new();
            if in_effect != accidental {
                first.push(match accidental {
                    Accidental::Sharp => '^',
                    Accidental::Flat => '_',
                    Accidental::Natural => '=',
                });
                bar_alterations.insert((letter, octave), accidental);
            }
            first.push_str(&name);
            (first, name, "-")
        }
    };

    let mut token = String::new();
    for (index, (length, _, _)) in note_values(segment.units).into_iter().enumerate() {
        if index == 0 {
            token.push_str(&first);
        } else {
            token.push_str(separator);
            token.push_str(&rest);
        }
        if length != 1 {
            token.push_str(&length.to_string());
        }
    }
    if segment.tie_start {
        token.push('-');
    }
    token
}

/// `C` is middle C, lowercase letters start one octave up.
fn note_name(letter: char, octave: i32) -> String {
    if octave >= 5 {
        let mut name = letter.to_ascii_lowercase().to_string();
        name.push_str(&"'".repeat((octave - 5) as usize));
        name
    } else {
        let mut name = letter.to_string();
        name.push_str(&",".repeat((4 - octave) as usize));
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::FrequencyFrame;
    use crate::music::{create_music_score, quantize_notes, Key, NoteEvent};

    fn score_of(pairs: &[(i32, f64)]) -> Score {
        create_music_score(
            pairs
                .iter()
                .map(|&(p, d)| NoteEvent::new(p, d).unwrap())
                .collect(),
        )
    }

    fn render(pairs: &[(i32, f64)], key: Key) -> String {
        let request = RenderRequest {
            title: "Blue Bossa".to_string(),
            key,
        };
        AbcRenderer
            .render(&score_of(pairs), &request)
            .unwrap()
            .text()
    }

    fn body(abc: &str) -> String {
        abc.lines()
            .skip_while(|line| !line.starts_with("K:"))
            .skip(1)
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn header() {
        let abc = render(&[(69, 1.0)], Key::D);
        assert!(abc.starts_with("X:1\nT:Blue Bossa\nT:(D)\nM:4/4\nL:1/16\nK:C clef=treble\n"));
    }

    #[test]
    fn note_lengths_in_sixteenths() {
        let abc = render(&[(69, 1.0), (71, 0.5), (72, 0.25)], Key::C);
        assert_eq!(body(&abc), "A4 B2 c |]");
    }

    #[test]
    fn ties_across_the_barline() {
        let abc = render(&[(60, 3.0), (62, 2.0)], Key::C);
        assert_eq!(body(&abc), "C12 D4- | D4 |]");
    }

    #[test]
    fn odd_lengths_become_tied_notes() {
        let frames: Vec<FrequencyFrame> = [440.0; 5]
            .into_iter()
            .chain([493.88; 7])
            .enumerate()
            .map(|(time_index, frequency_hz)| FrequencyFrame {
                time_index,
                frequency_hz,
                magnitude: 1.0,
            })
            .collect();
        let score = create_music_score(quantize_notes(&frames));
        let request = RenderRequest {
            title: "Runs".to_string(),
            key: Key::C,
        };
        let abc = AbcRenderer.render(&score, &request).unwrap().text();
        assert_eq!(body(&abc), "A4-A B6-B |]");

        let abc = render(&[(69, 1.25), (71, 2.75)], Key::C);
        assert_eq!(body(&abc), "A4-A B8-B3 |]");
    }

    #[test]
    fn split_notes_carry_the_accidental_once() {
        let abc = render(&[(66, 1.25), (66, 2.75)], Key::G);
        assert_eq!(body(&abc), "^F4-F F8-F3 |]");
    }

    #[test]
    fn odd_rests_are_split_without_ties() {
        let segment = Segment {
            pitch: None,
            units: 7,
            tie_start: false,
            tie_stop: false,
        };
        let token = segment_token(&segment, Key::C.spelling(), &mut HashMap::new());
        assert_eq!(token, "z6 z");
    }

    #[test]
    fn accidentals_are_written_once_per_bar_and_cancelled() {
        let abc = render(
            &[(66, 1.0), (66, 1.0), (65, 1.0), (66, 1.0), (66, 4.0)],
            Key::G,
        );
        assert_eq!(body(&abc), "^F4 F4 =F4 ^F4 | ^F16 |]");
    }

    #[test]
    fn flat_keys_spell_with_flats() {
        let abc = render(&[(70, 1.0), (63, 1.0)], Key::BFlat);
        assert_eq!(body(&abc), "_B4 _E4 |]");
    }

    #[test]
    fn octaves() {
        assert_eq!(note_name('C', 4), "C");
        assert_eq!(note_name('C', 3), "C,");
        assert_eq!(note_name('B', 2), "B,,");
        assert_eq!(note_name('C', 5), "c");
        assert_eq!(note_name('E', 6), "e'");
    }

    #[test]
    fn empty_score_is_a_bar_rest() {
        assert_eq!(body(&render(&[], Key::C)), "z16 |]");
    }

    #[test]
    fn four_bars_per_line() {
        let abc = render(&[(60, 4.0); 5], Key::C);
        assert_eq!(body(&abc), "C16 | C16 | C16 | C16 |\nC16 |]");
    }
}
