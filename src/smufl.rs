//! SMuFL code points used by the mensural renderer.
//!
//! Codes in the private use area `U+F700..` are only present in fonts
//! extending the standard mensural range (e.g. Machaut); callers must check
//! their availability before selecting them.

// ── Mensural black noteheads with stems ─────────────────────────────
pub const MENSURAL_BLACK_MAXIMA: u32 = 0xE950;
pub const MENSURAL_BLACK_LONGA: u32 = 0xE951;
pub const MENSURAL_BLACK_BREVIS: u32 = 0xE952;
pub const MENSURAL_BLACK_SEMIBREVIS: u32 = 0xE953;
pub const MENSURAL_BLACK_MINIMA: u32 = 0xE954;
pub const MENSURAL_BLACK_SEMIMINIMA: u32 = 0xE955;
pub const MENSURAL_BLACK_SEMIBREVIS_CAUDATA: u32 = 0xE959;
pub const MENSURAL_BLACK_FUSA: u32 = 0xF702;
pub const MENSURAL_BLACK_MINIMA_STEM_DOWN: u32 = 0xF703;
pub const MENSURAL_BLACK_LONGA_STEM_UP_RIGHT: u32 = 0xF707;
pub const MENSURAL_BLACK_LONGA_STEM_UP_LEFT: u32 = 0xF708;
pub const MENSURAL_BLACK_BREVIS_STEM_DOWN_LEFT: u32 = 0xF709;

// ── Bare noteheads ──────────────────────────────────────────────────
pub const MENSURAL_NOTEHEAD_MAXIMA_BLACK: u32 = 0xE930;
pub const MENSURAL_NOTEHEAD_SEMIBREVIS_BLACK: u32 = 0xE938;
pub const MENSURAL_NOTEHEAD_SEMIBREVIS_VOID: u32 = 0xE939;
pub const MENSURAL_NOTEHEAD_MINIMA_WHITE: u32 = 0xE93C;
pub const MENSURAL_NOTEHEAD_SEMIMINIMA_WHITE: u32 = 0xE93D;

// ── Combining stems and flags ───────────────────────────────────────
pub const MENSURAL_COMB_STEM_UP: u32 = 0xE93E;
pub const MENSURAL_COMB_STEM_DOWN: u32 = 0xE93F;
pub const MENSURAL_COMB_STEM_UP_FLAG_SEMIMINIMA: u32 = 0xE949;
pub const MENSURAL_COMB_STEM_DOWN_FLAG_SEMIMINIMA: u32 = 0xE94A;

// ── Oblique ligature forms ──────────────────────────────────────────
pub const MENSURAL_OBLIQUE_ASC_2ND_BLACK: u32 = 0xE970;
pub const MENSURAL_OBLIQUE_ASC_3RD_BLACK: u32 = 0xE974;
pub const MENSURAL_OBLIQUE_ASC_4TH_BLACK: u32 = 0xE978;
pub const MENSURAL_OBLIQUE_ASC_5TH_BLACK: u32 = 0xE97C;
pub const MENSURAL_OBLIQUE_DESC_2ND_BLACK: u32 = 0xE980;
pub const MENSURAL_OBLIQUE_DESC_3RD_BLACK: u32 = 0xE984;
pub const MENSURAL_OBLIQUE_DESC_4TH_BLACK: u32 = 0xE988;
pub const MENSURAL_OBLIQUE_DESC_5TH_BLACK: u32 = 0xE98C;
pub const MENSURAL_OBLIQUE_DESC_6TH_BLACK: u32 = 0xF730;

// ── Connecting lines ────────────────────────────────────────────────
pub const CHANT_CONNECTING_LINE_ASC_3RD: u32 = 0xE9BE;
pub const CHANT_CONNECTING_LINE_ASC_4TH: u32 = 0xE9BF;
pub const CHANT_CONNECTING_LINE_ASC_5TH: u32 = 0xE9C0;
pub const CHANT_CONNECTING_LINE_DESC_3RD: u32 = 0xF720;
pub const CHANT_CONNECTING_LINE_DESC_4TH: u32 = 0xF721;
pub const CHANT_CONNECTING_LINE_DESC_5TH: u32 = 0xF722;

// ── Plicas ──────────────────────────────────────────────────────────
pub const PLICA_BLACK_LONGA_ASC: u32 = 0xF710;
pub const PLICA_BLACK_LONGA_DESC: u32 = 0xF711;
pub const PLICA_BLACK_BREVIS_ASC: u32 = 0xF712;
pub const PLICA_BLACK_BREVIS_DESC: u32 = 0xF713;

// ── Rests ───────────────────────────────────────────────────────────
pub const MENSURAL_REST_MAXIMA: u32 = 0xE9F0;
pub const MENSURAL_REST_LONGA_PERFECTA: u32 = 0xE9F1;
pub const MENSURAL_REST_LONGA_IMPERFECTA: u32 = 0xE9F2;
pub const MENSURAL_REST_BREVIS: u32 = 0xE9F3;
pub const MENSURAL_REST_SEMIBREVIS: u32 = 0xE9F4;
pub const MENSURAL_REST_MINIMA: u32 = 0xE9F5;
pub const MENSURAL_REST_SEMIMINIMA: u32 = 0xE9F6;
pub const MENSURAL_REST_FUSA: u32 = 0xE9F7;
pub const MENSURAL_REST_SEMIFUSA: u32 = 0xE9F8;

// ── Mensuration signs ───────────────────────────────────────────────
pub const MENSURAL_PROLATION_1: u32 = 0xE910;
pub const MENSURAL_PROLATION_2: u32 = 0xE911;
pub const MENSURAL_PROLATION_6: u32 = 0xE915;
pub const MENSURAL_PROLATION_7: u32 = 0xE916;
pub const MENSURAL_PROLATION_COMBINING_DOT: u32 = 0xE920;
pub const MENSURAL_PROLATION_COMBINING_STROKE: u32 = 0xE925;

// ── Misc ────────────────────────────────────────────────────────────
pub const AUGMENTATION_DOT: u32 = 0xE1E7;
pub const TIME_SIG_0: u32 = 0xE080;

/// Time-signature digit glyphs spelling `value`.
pub fn time_sig_figures(value: u32) -> Vec<u32> {
    value
        .to_string()
        .bytes()
        .map(|digit| TIME_SIG_0 + u32::from(digit - b'0'))
        .collect()
}

/// Upper-case hex form used for glyph ids in the output.
pub fn code_str(code: u32) -> String {
    format!("{code:04X}")
}
