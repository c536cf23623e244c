//! The built-in primitives document: base data types and the traits the
//! primitive appliers and trait-derived properties key on. Every symbol
//! lookup falls back to it.

use crate::corpus::Corpus;
use crate::document::DocId;
use crate::error::ModelResult;
use crate::object::{DataTypeDef, Definition, DefinitionVariant, ObjectKind, Parameter, ParameterValue, TraitDef};

pub const BUILTINS_PATH: &str = "/schemaweave/primitives.cdm.json";

/// Data types whose derivation selects a parameter's object family.
pub const OBJECT_FAMILIES: [&str; 5] = ["entity", "attribute", "dataType", "trait", "attributeGroup"];

pub(crate) fn install(corpus: &mut Corpus) {
    let doc = match corpus.add_document_at(BUILTINS_PATH) {
        Ok(doc) => doc,
        Err(err) => {
            tracing::error!(%err, "failed to install built-in primitives");
            return;
        }
    };
    if let Err(err) = populate(corpus, doc) {
        tracing::error!(%err, "failed to install built-in primitives");
        return;
    }
    corpus.index_document(doc);
    corpus.graph.builtins = Some(doc);
}

struct Builder<'c> {
    corpus: &'c mut Corpus,
    doc: DocId,
}

impl Builder<'_> {
    fn data_type(&mut self, name: &str, extends: Option<&str>, format: Option<&str>) -> ModelResult<()> {
        let extends = extends.map(|base| self.corpus.make_ref(self.doc, ObjectKind::DataTypeRef, base));
        let traits = format
            .map(|f| vec![self.corpus.make_trait_ref(self.doc, f, Vec::new())])
            .unwrap_or_default();
        let def = Definition::new(DefinitionVariant::DataType(DataTypeDef {
            name: name.to_string(),
            extends,
        }))
        .with_traits(traits);
        self.corpus.add_definition(self.doc, def).map(drop)
    }

    fn param(&mut self, name: &str, data_type: &str, default: Option<&str>) -> Parameter {
        let dt = self.corpus.make_ref(self.doc, ObjectKind::DataTypeRef, data_type);
        let mut p = Parameter::new(name).with_data_type(dt);
        if let Some(default) = default {
            p = p.with_default(ParameterValue::text(default));
        }
        p
    }

    fn trait_def(
        &mut self,
        name: &str,
        extends: Option<&str>,
        parameters: Vec<Parameter>,
        elevated: bool,
    ) -> ModelResult<()> {
        let extends = extends.map(|base| self.corpus.make_ref(self.doc, ObjectKind::TraitRef, base));
        let def = Definition::new(DefinitionVariant::Trait(TraitDef {
            name: name.to_string(),
            extends,
            parameters,
            elevated: elevated.then_some(true),
            ..TraitDef::default()
        }));
        self.corpus.add_definition(self.doc, def).map(drop)
    }
}

fn populate(corpus: &mut Corpus, doc: DocId) -> ModelResult<()> {
    let mut b = Builder { corpus, doc };

    b.trait_def("is.dataFormat", None, Vec::new(), false)?;
    for format in ["character", "integer", "boolean", "numeric", "date"] {
        b.trait_def(&format!("is.dataFormat.{format}"), Some("is.dataFormat"), Vec::new(), false)?;
    }

    b.data_type("cdmObject", None, None)?;
    for family in OBJECT_FAMILIES {
        b.data_type(family, Some("cdmObject"), None)?;
    }
    b.data_type("string", None, Some("is.dataFormat.character"))?;
    b.data_type("integer", None, Some("is.dataFormat.integer"))?;
    b.data_type("boolean", None, Some("is.dataFormat.boolean"))?;
    b.data_type("decimal", None, Some("is.dataFormat.numeric"))?;
    b.data_type("date", None, Some("is.dataFormat.date"))?;

    let p = b.param("directives", "string", None);
    b.trait_def("does.imposeDirectives", None, vec![p], false)?;
    let p = b.param("directives", "string", None);
    b.trait_def("does.removeDirectives", None, vec![p], false)?;
    b.trait_def("does.referenceEntity", None, Vec::new(), false)?;
    let p = b.param("foreignKeyAttribute", "attribute", None);
    b.trait_def("does.referenceEntityVia", None, vec![p], true)?;

    let params = vec![
        b.param("startingOrdinal", "integer", Some("0")),
        b.param("maximumExpansion", "integer", Some("3")),
        b.param("renameFormat", "string", Some("{a}{o}")),
    ];
    b.trait_def("does.explainArray", None, params, false)?;
    let p = b.param("addedAttribute", "attribute", None);
    b.trait_def("does.addSupportingAttribute", None, vec![p], false)?;
    let p = b.param("renameFormat", "string", Some("{a}{M}"));
    b.trait_def("does.disambiguateNames", None, vec![p], false)?;
    b.trait_def("is.removed", None, Vec::new(), false)?;

    let p = b.param("entityReferences", "entity", None);
    b.trait_def("is.linkedEntity.identifier", None, vec![p], false)?;
    let p = b.param("inSupportOf", "string", None);
    b.trait_def("is.addedInSupportOf", None, vec![p], false)?;
    let p = b.param("attribute", "attribute", None);
    b.trait_def("is.identifiedBy", None, vec![p], false)?;
    b.trait_def("is.nullable", None, Vec::new(), false)?;
    b.trait_def("is.readOnly", None, Vec::new(), false)?;
    let params = vec![
        b.param("minimumValue", "string", None),
        b.param("maximumValue", "string", None),
        b.param("maximumLength", "integer", None),
    ];
    b.trait_def("is.constrained", None, params, false)?;
    let p = b.param("default", "string", None);
    b.trait_def("does.haveDefault", None, vec![p], false)?;
    let p = b.param("maxDepth", "integer", None);
    b.trait_def("does.setMaxDepth", None, vec![p], false)?;
    b.trait_def("is.legacyReference", None, Vec::new(), false)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_visible_from_any_document() {
        let mut corpus = Corpus::default();
        let doc = corpus.add_document_at("/user.cdm.json").unwrap();
        let found = corpus.resolve_symbol("does.referenceEntityVia", ObjectKind::TraitRef, Some(doc));
        assert!(found.is_some());
        assert!(corpus.fetch_object("/schemaweave/primitives.cdm.json/string").is_some());
    }
}
