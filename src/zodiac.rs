//! Tropical sun signs.

use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZodiacSign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

// (month, first day of the sign that starts in that month, sign starting that day)
const STARTS: [(u32, u32, ZodiacSign); 12] = [
    (1, 20, ZodiacSign::Aquarius),
    (2, 19, ZodiacSign::Pisces),
    (3, 21, ZodiacSign::Aries),
    (4, 20, ZodiacSign::Taurus),
    (5, 21, ZodiacSign::Gemini),
    (6, 21, ZodiacSign::Cancer),
    (7, 23, ZodiacSign::Leo),
    (8, 23, ZodiacSign::Virgo),
    (9, 23, ZodiacSign::Libra),
    (10, 23, ZodiacSign::Scorpio),
    (11, 22, ZodiacSign::Sagittarius),
    (12, 22, ZodiacSign::Capricorn),
];

impl ZodiacSign {
    pub fn from_birth_date(date: NaiveDate) -> Self {
        let (month, start_day, sign) = STARTS[date.month0() as usize];
        debug_assert_eq!(month, date.month());
        if date.day() >= start_day {
            sign
        } else {
            // Still in the sign that started the previous month
            STARTS[(date.month0() as usize + 11) % 12].2
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aries => "aries",
            Self::Taurus => "taurus",
            Self::Gemini => "gemini",
            Self::Cancer => "cancer",
            Self::Leo => "leo",
            Self::Virgo => "virgo",
            Self::Libra => "libra",
            Self::Scorpio => "scorpio",
            Self::Sagittarius => "sagittarius",
            Self::Capricorn => "capricorn",
            Self::Aquarius => "aquarius",
            Self::Pisces => "pisces",
        }
    }

    pub fn name(&self, locale: &str) -> &'static str {
        let (en, es) = match self {
            Self::Aries => ("Aries", "Aries"),
            Self::Taurus => ("Taurus", "Tauro"),
            Self::Gemini => ("Gemini", "Géminis"),
            Self::Cancer => ("Cancer", "Cáncer"),
            Self::Leo => ("Leo", "Leo"),
            Self::Virgo => ("Virgo", "Virgo"),
            Self::Libra => ("Libra", "Libra"),
            Self::Scorpio => ("Scorpio", "Escorpio"),
            Self::Sagittarius => ("Sagittarius", "Sagitario"),
            Self::Capricorn => ("Capricorn", "Capricornio"),
            Self::Aquarius => ("Aquarius", "Acuario"),
            Self::Pisces => ("Pisces", "Piscis"),
        };
        if locale == "en" {
            en
        } else {
            es
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        STARTS.iter().map(|(_, _, sign)| *sign).find(|sign| sign.as_str() == s)
    }
}
