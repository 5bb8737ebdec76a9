//! Static catalog of the CBS source tables and runtime dataset descriptors.

use crate::error::{DomainError, Result};
use crate::period::Granularity;
use serde::{Deserialize, Serialize};

// =============================================================================
// CATALOG TYPES
// =============================================================================

/// Which processed shape a dataset produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// Permit-to-completion lead times (quarterly)
    Doorlooptijden,
    /// Housing units in the construction pipeline (monthly)
    WoningenPijplijn,
}

/// A dimension of a source table and the label column it resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionSpec {
    /// Endpoint name and fact column holding the code
    pub name: &'static str,
    /// Column added by the transformer with the resolved title
    pub label_column: &'static str,
}

/// A raw measure column and its stable processed name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasureSpec {
    pub raw: &'static str,
    pub name: &'static str,
}

/// Fixed description of one CBS table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetDefinition {
    pub name: &'static str,
    pub table_id: &'static str,
    pub kind: DatasetKind,
    pub dimensions: &'static [DimensionSpec],
    pub measures: &'static [MeasureSpec],
    /// Column receiving the sub-year part of the period code
    pub period_part_column: &'static str,
    pub default_granularity: Granularity,
}

impl DatasetDefinition {
    /// `ID`, every dimension code column, then raw measures.
    #[must_use]
    pub fn select_columns(&self) -> Vec<&'static str> {
        std::iter::once("ID")
            .chain(self.dimensions.iter().map(|d| d.name))
            .chain(self.measures.iter().map(|m| m.raw))
            .collect()
    }

    #[must_use]
    pub fn rename_map(&self) -> Vec<(&'static str, &'static str)> {
        self.measures.iter().map(|m| (m.raw, m.name)).collect()
    }

    #[must_use]
    pub fn measure_names(&self) -> Vec<&'static str> {
        self.measures.iter().map(|m| m.name).collect()
    }

    /// The sub-year column and the seasonal period are tied to the
    /// catalog grain, so only that granularity can be processed.
    #[must_use]
    pub fn supports(&self, granularity: Granularity) -> bool {
        granularity == self.default_granularity
    }

    #[must_use]
    pub fn dimension(&self, name: &str) -> Option<&DimensionSpec> {
        self.dimensions.iter().find(|d| d.name.eq_ignore_ascii_case(name))
    }

    pub fn by_name(name: &str) -> Result<&'static Self> {
        CATALOG
            .iter()
            .copied()
            .find(|d| d.name == name)
            .ok_or_else(|| DomainError::UnknownDataset(name.to_string()))
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// Lead time from permit to completion of new dwellings (86260NED)
pub const DOORLOOPTIJDEN: DatasetDefinition = DatasetDefinition {
    name: "doorlooptijden",
    table_id: "86260NED",
    kind: DatasetKind::Doorlooptijden,
    dimensions: &[
        DimensionSpec {
            name: "Regiokenmerken",
            label_column: "Regio_Naam",
        },
        DimensionSpec {
            name: "Gebruiksfunctie",
            label_column: "Gebruiksfunctie_Naam",
        },
        DimensionSpec {
            name: "Woningtype",
            label_column: "Woningtype_Naam",
        },
        DimensionSpec {
            name: "Perioden",
            label_column: "Periode_Naam",
        },
    ],
    measures: &[
        MeasureSpec {
            raw: "NieuwbouwTotaal_1",
            name: "Nieuwbouw_Aantal",
        },
        MeasureSpec {
            raw: "k_10KwantielDoorlooptijdMaanden_2",
            name: "Doorlooptijd_P10",
        },
        MeasureSpec {
            raw: "k_25KwantielDoorlooptijdMaanden_3",
            name: "Doorlooptijd_P25",
        },
        MeasureSpec {
            raw: "MediaanDoorlooptijdMaanden_4",
            name: "Doorlooptijd_Mediaan",
        },
        MeasureSpec {
            raw: "k_75KwantielDoorlooptijdMaanden_5",
            name: "Doorlooptijd_P75",
        },
        MeasureSpec {
            raw: "k_90KwantielDoorlooptijdMaanden_6",
            name: "Doorlooptijd_P90",
        },
        MeasureSpec {
            raw: "GemiddeldeDoorlooptijdMaanden_7",
            name: "Doorlooptijd_Gemiddelde",
        },
    ],
    period_part_column: "Kwartaal",
    default_granularity: Granularity::Quarter,
};

/// Dwellings in the construction pipeline by stage and age (82211NED)
pub const WONINGEN_PIJPLIJN: DatasetDefinition = DatasetDefinition {
    name: "woningen_pijplijn",
    table_id: "82211NED",
    kind: DatasetKind::WoningenPijplijn,
    dimensions: &[
        DimensionSpec {
            name: "Gebruiksfunctie",
            label_column: "Gebruiksfunctie_Naam",
        },
        DimensionSpec {
            name: "RegioS",
            label_column: "Regio_Naam",
        },
        DimensionSpec {
            name: "Perioden",
            label_column: "Periode_Naam",
        },
    ],
    measures: &[
        MeasureSpec {
            raw: "VerblijfsobjectenInDePijplijnTotaal_1",
            name: "Pijplijn_Totaal",
        },
        MeasureSpec {
            raw: "BouwGestartPijplijn_2",
            name: "Pijplijn_BouwGestart",
        },
        MeasureSpec {
            raw: "Vergunningspijplijn_3",
            name: "Pijplijn_Vergunning",
        },
        MeasureSpec {
            raw: "TotaalInDePijplijn2Jaar_4",
            name: "Pijplijn_Vast_2Jaar",
        },
        MeasureSpec {
            raw: "BouwGestartPijplijn2Jaar_5",
            name: "Pijplijn_BouwGestart_2Jaar",
        },
        MeasureSpec {
            raw: "Vergunningspijplijn2Jaar_6",
            name: "Pijplijn_Vergunning_2Jaar",
        },
        MeasureSpec {
            raw: "TotaalInDePijplijn5Jaar_7",
            name: "Pijplijn_Vast_5Jaar",
        },
    ],
    period_part_column: "Maand",
    default_granularity: Granularity::Month,
};

pub const CATALOG: &[&DatasetDefinition] = &[&DOORLOOPTIJDEN, &WONINGEN_PIJPLIJN];

// =============================================================================
// DESCRIPTOR
// =============================================================================

/// A catalog table bound to an extraction window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetDescriptor {
    pub definition: &'static DatasetDefinition,
    pub start_year: i32,
    pub end_year: i32,
    pub granularity: Granularity,
}

impl DatasetDescriptor {
    #[must_use]
    pub const fn new(
        definition: &'static DatasetDefinition,
        start_year: i32,
        end_year: i32,
        granularity: Granularity,
    ) -> Self {
        Self {
            definition,
            start_year,
            end_year,
            granularity,
        }
    }

    #[must_use]
    pub fn period_filter(&self) -> String {
        self.granularity.range_filter(self.start_year, self.end_year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_columns_order() {
        let cols = WONINGEN_PIJPLIJN.select_columns();
        assert_eq!(&cols[..4], &["ID", "Gebruiksfunctie", "RegioS", "Perioden"]);
        assert_eq!(cols.len(), 4 + 7);
    }

    #[test]
    fn test_by_name() {
        assert_eq!(DatasetDefinition::by_name("doorlooptijden").unwrap().table_id, "86260NED");
        assert!(DatasetDefinition::by_name("bevolking").is_err());
    }

    #[test]
    fn test_descriptor_filter() {
        let d = DatasetDescriptor::new(&DOORLOOPTIJDEN, 2016, 2018, Granularity::Quarter);
        assert_eq!(d.period_filter(), "Perioden ge '2016KW01' and Perioden le '2018KW04'");
    }

    #[test]
    fn test_only_catalog_grain_is_supported() {
        assert!(DOORLOOPTIJDEN.supports(Granularity::Quarter));
        assert!(!DOORLOOPTIJDEN.supports(Granularity::Month));
        assert!(!DOORLOOPTIJDEN.supports(Granularity::Year));
        assert!(WONINGEN_PIJPLIJN.supports(Granularity::Month));
        assert!(!WONINGEN_PIJPLIJN.supports(Granularity::Quarter));
    }

    #[test]
    fn test_dimension_lookup_is_case_insensitive() {
        assert_eq!(
            WONINGEN_PIJPLIJN.dimension("regios").map(|d| d.label_column),
            Some("Regio_Naam")
        );
    }
}
