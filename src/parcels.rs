/*!
The parcel search core: turning free-text parcel requests into a selection on
a cadastral layer. This is deliberately independent of gdal so it can be
exercised against an in-memory layer; the dataset-backed implementation of
[`SelectionLayer`] lives in the cadastre module.
*/

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::errors::CommandError;
use crate::progress::ProgressObserver;
use crate::progress::WatchableIterator;

/// Raw request text longer than this is rejected before tokenizing.
pub(crate) const MAX_INPUT_LENGTH: usize = 5000;

/// Labels per IN-clause. Districts with more labels get several OR-joined clauses,
/// which keeps the expression below what drivers are willing to parse.
pub(crate) const EXPRESSION_BATCH_SIZE: usize = 500;

/// One requested parcel: a cadastral district code (KO) and the parcel label
/// within that district. Labels are free text and may contain '/'.
#[derive(Clone,Debug,PartialEq,Eq,Hash)]
pub(crate) struct ParcelKey {
    pub(crate) district: u32,
    pub(crate) label: String
}

fn parse_district(text: &str) -> Result<u32,CommandError> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return Err(CommandError::InvalidDistrictFormat(text.to_owned()));
    }
    text.parse().map_err(|_| CommandError::InvalidDistrictFormat(text.to_owned()))
}

fn split_tokens(raw: &str) -> Result<Vec<&str>,CommandError> {
    let raw = raw.trim();
    let length = raw.chars().count();
    if length > MAX_INPUT_LENGTH {
        return Err(CommandError::InputTooLong(length));
    }
    let tokens: Vec<&str> = raw.split(',').map(str::trim).filter(|t| !t.is_empty()).collect();
    if tokens.is_empty() {
        Err(CommandError::EmptyInput)
    } else {
        Ok(tokens)
    }
}

/// Parses the "separate" input mode: one district code for the whole request,
/// plus a comma-separated list of parcel labels.
pub(crate) fn parse_separate_request(district: &str, labels: &str) -> Result<Vec<ParcelKey>,CommandError> {
    let district = parse_district(district.trim())?;
    let tokens = split_tokens(labels)?;
    Ok(tokens.into_iter().map(|label| ParcelKey {
        district,
        label: label.to_owned()
    }).collect())
}

/// Parses the "combined" input mode: comma-separated 'label-district' entries.
///
/// Each entry is split on the FIRST hyphen. A label that legitimately contains
/// a hyphen therefore cannot be entered in this mode; the district portion ends
/// up non-numeric and the entry is rejected. That matches the long-standing
/// behavior of the ISeD search dialog, so it stays.
pub(crate) fn parse_combined_request(entries: &str) -> Result<Vec<ParcelKey>,CommandError> {
    let tokens = split_tokens(entries)?;
    let mut keys = Vec::with_capacity(tokens.len());
    for token in tokens {
        let Some((label,district)) = token.split_once('-') else {
            return Err(CommandError::MalformedCombinedToken(token.to_owned()));
        };
        keys.push(ParcelKey {
            district: parse_district(district.trim())?,
            label: label.trim().to_owned()
        });
    }
    Ok(keys)
}

/// The resolved pair of attribute columns the matcher works against.
#[derive(Clone,Debug,PartialEq,Eq)]
pub(crate) struct ParcelColumns {
    pub(crate) district: String,
    pub(crate) parcel: String
}

/// Guesses which columns hold the district code and the parcel label, from the
/// attribute names alone. GURS layers have been seen with several spellings,
/// so exact names are checked alongside looser substring forms; the first
/// matching name in declaration order wins for each role.
pub(crate) fn detect_parcel_columns(names: &[String]) -> (Option<String>,Option<String>) {
    let mut district = None;
    let mut parcel = None;
    for name in names {
        let folded = name.to_lowercase();
        if district.is_none() {
            let exact = matches!(folded.as_str(),"ko" | "ko_sifra" | "ko__sifra" | "ko_sifko");
            let loose = folded.contains("ko") && (folded.contains("sifra") || folded.contains("id") || folded.ends_with("_ko") || folded.starts_with("ko_"));
            if exact || loose {
                district = Some(name.clone());
            }
        }
        if parcel.is_none() {
            let exact = matches!(folded.as_str(),"parcela" | "st_parcele" | "stparcele" | "id_parcele");
            let loose = folded.contains("parcel") || folded.contains("parc") || folded.contains("st_parc");
            if exact || loose {
                parcel = Some(name.clone());
            }
        }
    }
    (district,parcel)
}

/// Asked to choose the two columns when the heuristics come up empty. The
/// console implementation prompts the operator; tests and non-interactive runs
/// use implementations that answer from arguments or decline.
pub(crate) trait FieldPicker {

    fn pick_columns(&self, names: &[String], district_default: Option<&str>, parcel_default: Option<&str>) -> Option<ParcelColumns>;

}

/// A picker that always declines, for contexts with nobody to ask.
pub(crate) struct DecliningFieldPicker;

impl FieldPicker for DecliningFieldPicker {

    fn pick_columns(&self, _: &[String], _: Option<&str>, _: Option<&str>) -> Option<ParcelColumns> {
        None
    }
}

/// Works out the district and parcel columns for a layer: explicit choices
/// first, then the name heuristics, and only then the picker. Declining the
/// picker aborts the whole search with `ColumnsUnresolved`.
pub(crate) fn resolve_parcel_columns<Picker: FieldPicker>(names: &[String], picker: &Picker, district_choice: Option<&str>, parcel_choice: Option<&str>) -> Result<ParcelColumns,CommandError> {
    let (detected_district,detected_parcel) = detect_parcel_columns(names);
    let district = district_choice.map(ToOwned::to_owned).or(detected_district);
    let parcel = parcel_choice.map(ToOwned::to_owned).or(detected_parcel);
    if let (Some(district),Some(parcel)) = (&district,&parcel) {
        Ok(ParcelColumns {
            district: district.clone(),
            parcel: parcel.clone()
        })
    } else {
        picker.pick_columns(names, district.as_deref(), parcel.as_deref()).ok_or(CommandError::ColumnsUnresolved)
    }
}

/// What the matcher needs from a feature layer. The selection itself is state
/// on the implementation; the matcher only ever replaces it wholesale.
pub(crate) trait SelectionLayer {

    fn field_names(&self) -> Vec<String>;

    fn field_index(&self, name: &str) -> Option<usize>;

    /// Selects exactly the features matching an attribute expression, replacing
    /// any previous selection. The expression syntax is the layer's own; a
    /// rejected expression must leave the selection empty.
    fn select_by_expression(&mut self, expression: &str) -> Result<(),CommandError>;

    fn select_by_ids(&mut self, ids: Vec<u64>);

    fn clear_selection(&mut self);

    fn selected_count(&self) -> usize;

    /// Reads the two given columns off every feature as text. Features whose
    /// attributes can't be read are left out rather than failing the scan.
    fn scan_columns(&mut self, district_index: usize, parcel_index: usize) -> Vec<(u64,Option<String>,Option<String>)>;

}

/// Builds the disjunctive selection expression for a set of requested keys:
/// per district (and per batch of 500 labels within a district) one clause of
/// the form `("KO" = 1220 AND "PARCELA" IN ('500/1','500/2'))`, all joined
/// with OR. Single quotes inside labels are doubled.
pub(crate) fn build_selection_expression(columns: &ParcelColumns, keys: &[ParcelKey]) -> String {
    let mut grouped: IndexMap<String,Vec<&str>> = IndexMap::new();
    for key in keys {
        grouped.entry(key.district.to_string()).or_default().push(&key.label);
    }
    let mut clauses = Vec::new();
    for (district,labels) in &grouped {
        for batch in labels.chunks(EXPRESSION_BATCH_SIZE) {
            let values = batch.iter().map(|label| format!("'{}'",label.replace('\'',"''"))).collect::<Vec<_>>().join(",");
            clauses.push(format!("(\"{}\" = {} AND \"{}\" IN ({}))",columns.district,district,columns.parcel,values));
        }
    }
    clauses.join(" OR ")
}

/// Selects the features whose (district,parcel) pair appears in the request
/// and returns how many ended up selected.
///
/// The fast path hands the constructed expression to the layer's own query
/// engine. If the layer rejects it, the request is matched by a single manual
/// scan over all features instead; only when the scan can't even resolve its
/// two columns does the original rejection surface.
pub(crate) fn select_parcels<Layer: SelectionLayer, Progress: ProgressObserver>(layer: &mut Layer, columns: &ParcelColumns, keys: &[ParcelKey], progress: &mut Progress) -> Result<usize,CommandError> {
    if keys.is_empty() {
        layer.clear_selection();
        return Ok(0);
    }
    let expression = build_selection_expression(columns, keys);
    if let Err(rejection) = layer.select_by_expression(&expression) {
        layer.clear_selection();
        let district_index = layer.field_index(&columns.district);
        let parcel_index = layer.field_index(&columns.parcel);
        let (Some(district_index),Some(parcel_index)) = (district_index,parcel_index) else {
            return Err(rejection);
        };
        progress.warning(|| format!("The layer rejected the selection expression, scanning instead. ({})",rejection));
        let requested: HashSet<(String,&str)> = keys.iter().map(|key| (key.district.to_string(),key.label.as_str())).collect();
        let mut ids = Vec::new();
        for (fid,district,parcel) in layer.scan_columns(district_index, parcel_index).into_iter().watch(progress,"Scanning parcels.","Parcels scanned.") {
            if let (Some(district),Some(parcel)) = (district,parcel) {
                if requested.contains(&(district,parcel.as_str())) {
                    ids.push(fid);
                }
            }
        }
        layer.select_by_ids(ids);
    }
    Ok(layer.selected_count())
}

#[cfg(test)]
mod test {

    use std::collections::HashSet;

    use super::build_selection_expression;
    use super::detect_parcel_columns;
    use super::parse_combined_request;
    use super::parse_separate_request;
    use super::resolve_parcel_columns;
    use super::select_parcels;
    use super::DecliningFieldPicker;
    use super::FieldPicker;
    use super::ParcelColumns;
    use super::ParcelKey;
    use super::SelectionLayer;
    use crate::errors::CommandError;

    fn key(district: u32, label: &str) -> ParcelKey {
        ParcelKey {
            district,
            label: label.to_owned()
        }
    }

    fn columns() -> ParcelColumns {
        ParcelColumns {
            district: "KO_SIFRA".to_owned(),
            parcel: "ST_PARCELE".to_owned()
        }
    }

    // An in-memory stand-in for a feature layer, with just enough of an
    // expression evaluator to handle the clause shape the builder emits.
    struct MemoryLayer {
        fields: Vec<String>,
        features: Vec<(u64,Vec<Option<String>>)>,
        selection: HashSet<u64>,
        reject_expressions: bool,
        evaluations: usize
    }

    impl MemoryLayer {

        fn new(fields: &[&str], features: Vec<(u64,Vec<Option<&str>>)>) -> Self {
            Self {
                fields: fields.iter().map(|f| (*f).to_owned()).collect(),
                features: features.into_iter().map(|(fid,values)| (fid,values.into_iter().map(|v| v.map(ToOwned::to_owned)).collect())).collect(),
                selection: HashSet::new(),
                reject_expressions: false,
                evaluations: 0
            }
        }

        fn parse_quoted_list(text: &str) -> Option<Vec<String>> {
            // values look like 'a','b''c','d'
            let mut values = Vec::new();
            let mut current = String::new();
            let mut chars = text.chars().peekable();
            while let Some(c) = chars.next() {
                if c != '\'' {
                    return None;
                }
                loop {
                    match chars.next() {
                        Some('\'') => if chars.peek() == Some(&'\'') {
                            current.push('\'');
                            _ = chars.next();
                        } else {
                            break;
                        },
                        Some(other) => current.push(other),
                        None => return None
                    }
                }
                values.push(std::mem::take(&mut current));
                match chars.next() {
                    Some(',') => (),
                    Some(_) => return None,
                    None => break
                }
            }
            Some(values)
        }

        // parses one `("F" = N AND "G" IN (...))` clause into (field,value,field,values)
        fn parse_clause(clause: &str) -> Option<(String,String,String,Vec<String>)> {
            let clause = clause.strip_prefix('(')?.strip_suffix(')')?;
            let (equality,membership) = clause.split_once(" AND ")?;
            let (district_field,district_value) = equality.split_once(" = ")?;
            let district_field = district_field.strip_prefix('"')?.strip_suffix('"')?;
            let (parcel_field,list) = membership.split_once(" IN ")?;
            let parcel_field = parcel_field.strip_prefix('"')?.strip_suffix('"')?;
            let list = list.strip_prefix('(')?.strip_suffix(')')?;
            Some((district_field.to_owned(),district_value.to_owned(),parcel_field.to_owned(),Self::parse_quoted_list(list)?))
        }

        fn selected_sorted(&self) -> Vec<u64> {
            let mut ids: Vec<u64> = self.selection.iter().copied().collect();
            ids.sort_unstable();
            ids
        }
    }

    impl SelectionLayer for MemoryLayer {

        fn field_names(&self) -> Vec<String> {
            self.fields.clone()
        }

        fn field_index(&self, name: &str) -> Option<usize> {
            self.fields.iter().position(|f| f == name)
        }

        fn select_by_expression(&mut self, expression: &str) -> Result<(),CommandError> {
            self.evaluations += 1;
            if self.reject_expressions {
                return Err(CommandError::ExpressionEvaluationFailed("rejected for the test".to_owned()));
            }
            let mut clauses = Vec::new();
            for clause in expression.split(" OR ") {
                let (district_field,district_value,parcel_field,labels) = Self::parse_clause(clause).ok_or_else(|| CommandError::ExpressionEvaluationFailed(clause.to_owned()))?;
                let district_index = self.field_index(&district_field).ok_or_else(|| CommandError::ExpressionEvaluationFailed(district_field.clone()))?;
                let parcel_index = self.field_index(&parcel_field).ok_or_else(|| CommandError::ExpressionEvaluationFailed(parcel_field.clone()))?;
                clauses.push((district_index,district_value,parcel_index,labels));
            }
            let mut selection = HashSet::new();
            for (fid,values) in &self.features {
                for (district_index,district_value,parcel_index,labels) in &clauses {
                    let district_matches = values.get(*district_index).and_then(|v| v.as_ref()).is_some_and(|v| v == district_value);
                    let parcel_matches = values.get(*parcel_index).and_then(|v| v.as_ref()).is_some_and(|v| labels.contains(v));
                    if district_matches && parcel_matches {
                        _ = selection.insert(*fid);
                        break;
                    }
                }
            }
            self.selection = selection;
            Ok(())
        }

        fn select_by_ids(&mut self, ids: Vec<u64>) {
            self.selection = ids.into_iter().collect();
        }

        fn clear_selection(&mut self) {
            self.selection.clear();
        }

        fn selected_count(&self) -> usize {
            self.selection.len()
        }

        fn scan_columns(&mut self, district_index: usize, parcel_index: usize) -> Vec<(u64,Option<String>,Option<String>)> {
            self.features.iter().map(|(fid,values)| (
                *fid,
                values.get(district_index).and_then(Clone::clone),
                values.get(parcel_index).and_then(Clone::clone)
            )).collect()
        }
    }

    fn sample_layer() -> MemoryLayer {
        MemoryLayer::new(&["KO_SIFRA","ST_PARCELE"], vec![
            (1,vec![Some("1220"),Some("500/1")]),
            (2,vec![Some("1220"),Some("500/2")]),
            (3,vec![Some("1221"),Some("10")]),
            (4,vec![Some("1220"),Some("500'A")]),
        ])
    }

    #[test]
    fn separate_request_trims_and_drops_blanks() {
        let keys = parse_separate_request("1220"," 500/1, ,500/2 ,").unwrap();
        assert_eq!(keys,vec![key(1220,"500/1"),key(1220,"500/2")]);
    }

    #[test]
    fn separate_request_rejects_nonnumeric_district() {
        assert!(matches!(parse_separate_request("12A0","500/1"),Err(CommandError::InvalidDistrictFormat(_))));
    }

    #[test]
    fn separate_request_rejects_empty_and_overlong_input() {
        assert!(matches!(parse_separate_request("1220","  , , "),Err(CommandError::EmptyInput)));
        let long = "5".repeat(5001);
        assert!(matches!(parse_separate_request("1220",&long),Err(CommandError::InputTooLong(5001))));
    }

    #[test]
    fn combined_request_splits_on_first_hyphen() {
        let keys = parse_combined_request("500/1-1220, 505-1220 ,700-1221").unwrap();
        assert_eq!(keys,vec![key(1220,"500/1"),key(1220,"505"),key(1221,"700")]);
    }

    #[test]
    fn combined_request_rejects_token_without_separator() {
        assert!(matches!(parse_combined_request("5001220"),Err(CommandError::MalformedCombinedToken(_))));
    }

    #[test]
    fn combined_request_hyphenated_label_is_rejected_as_nonnumeric_district() {
        // a hyphen inside the label bleeds into the district portion; the
        // dialog has always behaved this way, so the core does too
        assert!(matches!(parse_combined_request("500-1-1220"),Err(CommandError::InvalidDistrictFormat(_))));
    }

    #[test]
    fn column_detection_prefers_first_declared_candidate() {
        let names: Vec<String> = ["OBJECTID","KO_SIFRA","KO_NAZIV_SIFRA","ST_PARCELE","PARCELA"].iter().map(|n| (*n).to_owned()).collect();
        let (district,parcel) = detect_parcel_columns(&names);
        assert_eq!(district.as_deref(),Some("KO_SIFRA"));
        assert_eq!(parcel.as_deref(),Some("ST_PARCELE"));
    }

    #[test]
    fn column_detection_handles_loose_names() {
        let names: Vec<String> = ["sifra_ko","st_parc"].iter().map(|n| (*n).to_owned()).collect();
        let (district,parcel) = detect_parcel_columns(&names);
        assert_eq!(district.as_deref(),Some("sifra_ko"));
        assert_eq!(parcel.as_deref(),Some("st_parc"));
    }

    #[test]
    fn unresolved_columns_fall_through_to_the_picker() {
        let names: Vec<String> = vec!["A".to_owned(),"B".to_owned()];
        assert!(matches!(resolve_parcel_columns(&names,&DecliningFieldPicker,None,None),Err(CommandError::ColumnsUnresolved)));

        struct AnsweringPicker;
        impl FieldPicker for AnsweringPicker {
            fn pick_columns(&self, names: &[String], _: Option<&str>, _: Option<&str>) -> Option<ParcelColumns> {
                Some(ParcelColumns {
                    district: names[0].clone(),
                    parcel: names[1].clone()
                })
            }
        }
        let columns = resolve_parcel_columns(&names,&AnsweringPicker,None,None).unwrap();
        assert_eq!(columns,ParcelColumns { district: "A".to_owned(), parcel: "B".to_owned() });
    }

    #[test]
    fn explicit_column_choices_win_over_detection() {
        let names: Vec<String> = ["KO","PARCELA","MOJA_KO","MOJ_PARC"].iter().map(|n| (*n).to_owned()).collect();
        let columns = resolve_parcel_columns(&names,&DecliningFieldPicker,Some("MOJA_KO"),Some("MOJ_PARC")).unwrap();
        assert_eq!(columns,ParcelColumns { district: "MOJA_KO".to_owned(), parcel: "MOJ_PARC".to_owned() });
    }

    #[test]
    fn expression_escapes_quotes_and_batches_labels() {
        let keys: Vec<ParcelKey> = (0..1001).map(|i| key(1220,&format!("{}/1",i))).collect();
        let expression = build_selection_expression(&columns(),&keys);
        assert_eq!(expression.matches(" OR ").count(),2); // 500 + 500 + 1
        assert!(expression.starts_with("(\"KO_SIFRA\" = 1220 AND \"ST_PARCELE\" IN ("));

        let quoted = build_selection_expression(&columns(),&[key(1220,"500'A")]);
        assert_eq!(quoted,"(\"KO_SIFRA\" = 1220 AND \"ST_PARCELE\" IN ('500''A'))");
    }

    #[test]
    fn matching_selects_exactly_the_requested_features() {
        let mut layer = sample_layer();
        let count = select_parcels(&mut layer,&columns(),&[key(1220,"500/1"),key(1220,"500/2")],&mut ()).unwrap();
        assert_eq!(count,2);
        assert_eq!(layer.selected_sorted(),vec![1,2]);
    }

    #[test]
    fn duplicate_keys_do_not_inflate_the_count() {
        let mut layer = sample_layer();
        let count = select_parcels(&mut layer,&columns(),&[key(1220,"500/1"),key(1220,"500/1")],&mut ()).unwrap();
        assert_eq!(count,1);
    }

    #[test]
    fn empty_request_clears_selection_without_evaluating() {
        let mut layer = sample_layer();
        layer.select_by_ids(vec![1,2,3]);
        let count = select_parcels(&mut layer,&columns(),&[],&mut ()).unwrap();
        assert_eq!(count,0);
        assert_eq!(layer.selected_count(),0);
        assert_eq!(layer.evaluations,0);
    }

    #[test]
    fn embedded_quote_roundtrips_through_the_expression() {
        let mut layer = sample_layer();
        let count = select_parcels(&mut layer,&columns(),&[key(1220,"500'A")],&mut ()).unwrap();
        assert_eq!(count,1);
        assert_eq!(layer.selected_sorted(),vec![4]);
    }

    #[test]
    fn batched_request_matches_across_all_batches() {
        let mut layer = MemoryLayer::new(&["KO_SIFRA","ST_PARCELE"],Vec::new());
        layer.features = (0..1001).map(|i| (i,vec![Some("1220".to_owned()),Some(format!("{}/1",i))])).collect();
        let keys: Vec<ParcelKey> = (0..1001).map(|i| key(1220,&format!("{}/1",i))).collect();
        let count = select_parcels(&mut layer,&columns(),&keys,&mut ()).unwrap();
        assert_eq!(count,1001);
    }

    #[test]
    fn fallback_scan_matches_the_expression_path() {
        let keys = [key(1220,"500/1"),key(1220,"500'A"),key(1221,"10")];

        let mut expression_layer = sample_layer();
        let expression_count = select_parcels(&mut expression_layer,&columns(),&keys,&mut ()).unwrap();

        let mut fallback_layer = sample_layer();
        fallback_layer.reject_expressions = true;
        let fallback_count = select_parcels(&mut fallback_layer,&columns(),&keys,&mut ()).unwrap();

        assert_eq!(expression_count,3);
        assert_eq!(fallback_count,expression_count);
        assert_eq!(fallback_layer.selected_sorted(),expression_layer.selected_sorted());
    }

    #[test]
    fn fallback_skips_unreadable_features() {
        let mut layer = MemoryLayer::new(&["KO_SIFRA","ST_PARCELE"], vec![
            (1,vec![Some("1220"),Some("500/1")]),
            (2,vec![None,Some("500/1")]),
            (3,vec![Some("1220"),None]),
        ]);
        layer.reject_expressions = true;
        let count = select_parcels(&mut layer,&columns(),&[key(1220,"500/1")],&mut ()).unwrap();
        assert_eq!(count,1);
        assert_eq!(layer.selected_sorted(),vec![1]);
    }

    #[test]
    fn fallback_without_resolvable_columns_surfaces_the_rejection() {
        let mut layer = sample_layer();
        layer.reject_expressions = true;
        let bogus = ParcelColumns {
            district: "NO_SUCH".to_owned(),
            parcel: "COLUMNS".to_owned()
        };
        let result = select_parcels(&mut layer,&bogus,&[key(1220,"500/1")],&mut ());
        assert!(matches!(result,Err(CommandError::ExpressionEvaluationFailed(_))));
        assert_eq!(layer.selected_count(),0);
    }
}
