use crate::font::UnicodeMapping;

/// Metrics for one of the 14 built-in faces. Widths are 1/1000-em units
/// indexed by byte value; `winansi` selects the /WinAnsiEncoding override and
/// the shared CP1252 ToUnicode map.
pub(crate) struct CoreFont {
    pub name: &'static str,
    pub up: i16,
    pub ut: i16,
    pub widths: &'static [u16; 256],
    pub winansi: bool,
}

pub(crate) const CORE_FAMILIES: [&str; 5] =
    ["courier", "helvetica", "times", "symbol", "zapfdingbats"];

pub(crate) fn is_core_family(family: &str) -> bool {
    CORE_FAMILIES.contains(&family)
}

/// Resolve a lowercased family plus style suffix ("", "B", "I", "BI") to its
/// face. Symbol and ZapfDingbats exist only in the regular style.
pub(crate) fn lookup(family: &str, suffix: &str) -> Option<&'static CoreFont> {
    let face = match (family, suffix) {
        ("courier", "") => &COURIER,
        ("courier", "B") => &COURIER_BOLD,
        ("courier", "I") => &COURIER_OBLIQUE,
        ("courier", "BI") => &COURIER_BOLD_OBLIQUE,
        ("helvetica", "") => &HELVETICA,
        ("helvetica", "B") => &HELVETICA_BOLD,
        ("helvetica", "I") => &HELVETICA_OBLIQUE,
        ("helvetica", "BI") => &HELVETICA_BOLD_OBLIQUE,
        ("times", "") => &TIMES_ROMAN,
        ("times", "B") => &TIMES_BOLD,
        ("times", "I") => &TIMES_ITALIC,
        ("times", "BI") => &TIMES_BOLD_ITALIC,
        ("symbol", "") => &SYMBOL,
        ("zapfdingbats", "") => &ZAPFDINGBATS,
        _ => return None,
    };
    Some(face)
}

/// CP1252 byte values to Unicode code points, used for the ToUnicode CMap all
/// WinAnsi faces share.
pub(crate) const CP1252_UNICODE: &[(u8, UnicodeMapping)] = &[
    (0, UnicodeMapping::Range { start: 0, len: 128 }),
    (128, UnicodeMapping::Single(8364)),
    (130, UnicodeMapping::Single(8218)),
    (131, UnicodeMapping::Single(402)),
    (132, UnicodeMapping::Single(8222)),
    (133, UnicodeMapping::Single(8230)),
    (134, UnicodeMapping::Range { start: 8224, len: 2 }),
    (136, UnicodeMapping::Single(710)),
    (137, UnicodeMapping::Single(8240)),
    (138, UnicodeMapping::Single(352)),
    (139, UnicodeMapping::Single(8249)),
    (140, UnicodeMapping::Single(338)),
    (142, UnicodeMapping::Single(381)),
    (145, UnicodeMapping::Range { start: 8216, len: 2 }),
    (147, UnicodeMapping::Range { start: 8220, len: 2 }),
    (149, UnicodeMapping::Single(8226)),
    (150, UnicodeMapping::Range { start: 8211, len: 2 }),
    (152, UnicodeMapping::Single(732)),
    (153, UnicodeMapping::Single(8482)),
    (154, UnicodeMapping::Single(353)),
    (155, UnicodeMapping::Single(8250)),
    (156, UnicodeMapping::Single(339)),
    (158, UnicodeMapping::Single(382)),
    (159, UnicodeMapping::Single(376)),
    (160, UnicodeMapping::Range { start: 160, len: 96 }),
];

// Width tables: bytes 0-31 take the face's space width, 32-126 the AFM
// values, 127-255 a flat notdef width, matching the metric files the engine
// was built against. Courier is uniformly 600.

const fn expand(space: u16, ascii: [u16; 95], high: u16) -> [u16; 256] {
    let mut widths = [0u16; 256];
    let mut i = 0;
    while i < 32 {
        widths[i] = space;
        i += 1;
    }
    while i < 127 {
        widths[i] = ascii[i - 32];
        i += 1;
    }
    while i < 256 {
        widths[i] = high;
        i += 1;
    }
    widths
}

const fn uniform(width: u16) -> [u16; 256] {
    let mut widths = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        widths[i] = width;
        i += 1;
    }
    widths
}

const COURIER_WIDTHS: [u16; 256] = uniform(600);

const HELVETICA_WIDTHS: [u16; 256] = expand(
    278,
    [
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556,
        556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722,
        722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722,
        667, 944, 667, 667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556,
        556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500,
        500, 334, 260, 334, 584,
    ],
    350,
);

const HELVETICA_BOLD_WIDTHS: [u16; 256] = expand(
    278,
    [
        278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556,
        556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, 975, 722, 722, 722,
        722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667, 778, 722, 667, 611, 722,
        667, 944, 667, 667, 611, 333, 278, 333, 584, 556, 333, 556, 611, 556, 611, 556, 333, 611,
        611, 278, 278, 556, 278, 889, 611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556,
        500, 389, 280, 389, 584,
    ],
    350,
);

const TIMES_WIDTHS: [u16; 256] = expand(
    250,
    [
        250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, 500, 500,
        500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, 921, 722, 667, 667,
        722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722, 556, 722, 667, 556, 611, 722,
        722, 944, 722, 722, 611, 333, 278, 333, 469, 500, 333, 444, 500, 444, 500, 444, 333, 500,
        500, 278, 278, 500, 278, 778, 500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500,
        444, 480, 200, 480, 541,
    ],
    350,
);

const TIMES_BOLD_WIDTHS: [u16; 256] = expand(
    250,
    [
        250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278, 500, 500,
        500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500, 930, 722, 667, 722,
        722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778, 611, 778, 722, 556, 667, 722,
        722, 1000, 722, 722, 667, 333, 278, 333, 581, 500, 333, 500, 556, 444, 556, 444, 333, 500,
        556, 278, 333, 556, 278, 833, 556, 500, 556, 556, 444, 389, 333, 556, 500, 722, 500, 500,
        444, 394, 220, 394, 520,
    ],
    350,
);

const TIMES_ITALIC_WIDTHS: [u16; 256] = expand(
    250,
    [
        250, 333, 420, 500, 500, 833, 778, 214, 333, 333, 500, 675, 250, 333, 250, 278, 500, 500,
        500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 675, 675, 675, 500, 920, 611, 611, 667,
        722, 611, 611, 722, 722, 333, 444, 667, 556, 833, 667, 722, 611, 722, 611, 500, 556, 722,
        611, 833, 611, 556, 556, 389, 278, 389, 422, 500, 333, 500, 500, 444, 500, 444, 278, 500,
        500, 278, 278, 444, 278, 722, 500, 500, 500, 500, 389, 389, 278, 500, 444, 667, 444, 444,
        389, 400, 275, 400, 541,
    ],
    350,
);

const TIMES_BOLD_ITALIC_WIDTHS: [u16; 256] = expand(
    250,
    [
        250, 389, 555, 500, 500, 833, 778, 278, 333, 333, 500, 570, 250, 333, 250, 278, 500, 500,
        500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500, 832, 667, 667, 667,
        722, 667, 667, 722, 778, 389, 500, 667, 611, 889, 722, 722, 611, 722, 667, 556, 611, 722,
        667, 889, 667, 611, 611, 333, 278, 333, 570, 500, 333, 500, 500, 444, 500, 444, 333, 500,
        556, 278, 278, 500, 278, 778, 556, 500, 500, 500, 389, 389, 278, 556, 444, 667, 500, 444,
        389, 348, 220, 348, 570,
    ],
    350,
);

const SYMBOL_WIDTHS: [u16; 256] = expand(
    250,
    [
        250, 333, 713, 500, 549, 833, 778, 439, 333, 333, 500, 549, 250, 549, 250, 278, 500, 500,
        500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 549, 549, 549, 444, 549, 722, 667, 722,
        612, 611, 763, 603, 722, 333, 631, 722, 686, 889, 722, 722, 768, 741, 556, 592, 611, 690,
        439, 768, 645, 795, 611, 333, 863, 333, 658, 500, 500, 631, 549, 549, 494, 439, 521, 411,
        603, 329, 603, 549, 549, 576, 521, 549, 549, 521, 549, 603, 439, 576, 713, 686, 493, 686,
        494, 480, 200, 480, 549,
    ],
    350,
);

const ZAPFDINGBATS_WIDTHS: [u16; 256] = expand(
    278,
    [
        278, 974, 961, 974, 980, 719, 789, 790, 791, 690, 960, 939, 549, 855, 911, 933, 911, 945,
        974, 755, 846, 762, 761, 571, 677, 763, 760, 759, 754, 494, 552, 537, 577, 692, 786, 788,
        788, 790, 793, 794, 816, 823, 789, 841, 823, 833, 816, 831, 923, 744, 723, 749, 790, 792,
        695, 776, 768, 792, 759, 707, 708, 682, 701, 826, 815, 789, 789, 707, 687, 696, 689, 786,
        787, 713, 791, 785, 791, 873, 761, 762, 762, 759, 759, 892, 892, 788, 784, 438, 138, 277,
        415, 392, 392, 668, 668,
    ],
    350,
);

const COURIER: CoreFont = CoreFont {
    name: "Courier",
    up: -100,
    ut: 50,
    widths: &COURIER_WIDTHS,
    winansi: true,
};

const COURIER_BOLD: CoreFont = CoreFont {
    name: "Courier-Bold",
    up: -100,
    ut: 50,
    widths: &COURIER_WIDTHS,
    winansi: true,
};

const COURIER_OBLIQUE: CoreFont = CoreFont {
    name: "Courier-Oblique",
    up: -100,
    ut: 50,
    widths: &COURIER_WIDTHS,
    winansi: true,
};

const COURIER_BOLD_OBLIQUE: CoreFont = CoreFont {
    name: "Courier-BoldOblique",
    up: -100,
    ut: 50,
    widths: &COURIER_WIDTHS,
    winansi: true,
};

const HELVETICA: CoreFont = CoreFont {
    name: "Helvetica",
    up: -100,
    ut: 50,
    widths: &HELVETICA_WIDTHS,
    winansi: true,
};

const HELVETICA_BOLD: CoreFont = CoreFont {
    name: "Helvetica-Bold",
    up: -100,
    ut: 50,
    widths: &HELVETICA_BOLD_WIDTHS,
    winansi: true,
};

const HELVETICA_OBLIQUE: CoreFont = CoreFont {
    name: "Helvetica-Oblique",
    up: -100,
    ut: 50,
    widths: &HELVETICA_WIDTHS,
    winansi: true,
};

const HELVETICA_BOLD_OBLIQUE: CoreFont = CoreFont {
    name: "Helvetica-BoldOblique",
    up: -100,
    ut: 50,
    widths: &HELVETICA_BOLD_WIDTHS,
    winansi: true,
};

const TIMES_ROMAN: CoreFont = CoreFont {
    name: "Times-Roman",
    up: -100,
    ut: 50,
    widths: &TIMES_WIDTHS,
    winansi: true,
};

const TIMES_BOLD: CoreFont = CoreFont {
    name: "Times-Bold",
    up: -100,
    ut: 50,
    widths: &TIMES_BOLD_WIDTHS,
    winansi: true,
};

const TIMES_ITALIC: CoreFont = CoreFont {
    name: "Times-Italic",
    up: -100,
    ut: 50,
    widths: &TIMES_ITALIC_WIDTHS,
    winansi: true,
};

const TIMES_BOLD_ITALIC: CoreFont = CoreFont {
    name: "Times-BoldItalic",
    up: -100,
    ut: 50,
    widths: &TIMES_BOLD_ITALIC_WIDTHS,
    winansi: true,
};

const SYMBOL: CoreFont = CoreFont {
    name: "Symbol",
    up: -100,
    ut: 50,
    widths: &SYMBOL_WIDTHS,
    winansi: false,
};

const ZAPFDINGBATS: CoreFont = CoreFont {
    name: "ZapfDingbats",
    up: -100,
    ut: 50,
    widths: &ZAPFDINGBATS_WIDTHS,
    winansi: false,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_ascii_widths() {
        let face = lookup("helvetica", "").unwrap();
        assert_eq!(face.widths[b' ' as usize], 278);
        assert_eq!(face.widths[b'@' as usize], 1015);
        assert_eq!(face.widths[b'W' as usize], 944);
        assert_eq!(face.widths[b'i' as usize], 222);
        assert_eq!(face.widths[0], 278);
        assert_eq!(face.widths[200], 350);
    }

    #[test]
    fn courier_is_monospaced() {
        let face = lookup("courier", "BI").unwrap();
        assert!(face.widths.iter().all(|&w| w == 600));
        assert_eq!(face.name, "Courier-BoldOblique");
    }

    #[test]
    fn oblique_shares_upright_widths() {
        let upright = lookup("helvetica", "").unwrap();
        let oblique = lookup("helvetica", "I").unwrap();
        assert_eq!(upright.widths, oblique.widths);
        assert_eq!(oblique.name, "Helvetica-Oblique");
    }

    #[test]
    fn symbol_has_no_styles() {
        assert!(lookup("symbol", "").is_some());
        assert!(lookup("symbol", "B").is_none());
        assert!(lookup("zapfdingbats", "I").is_none());
    }

    #[test]
    fn symbol_skips_winansi() {
        assert!(!lookup("symbol", "").unwrap().winansi);
        assert!(lookup("times", "B").unwrap().winansi);
    }

    #[test]
    fn cp1252_map_covers_ascii_run() {
        let (code, mapping) = CP1252_UNICODE[0];
        assert_eq!(code, 0);
        assert_eq!(mapping, UnicodeMapping::Range { start: 0, len: 128 });
    }
}
