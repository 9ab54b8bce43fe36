use super::{
    ArrayQuery, ConditionQuery, NullableStringQuery, ObjectQuery, StringQuery, TypedQuery,
    map_output,
};
use crate::execution::locator::Locator;
use crate::imports::*;

#[derive(Clone)]
pub struct ElementQuery {
    node: QueryNode,
}

impl TypedQuery for ElementQuery {
    const KIND: ResultKind = ResultKind::Element;
    type Output = ElementHandle;

    fn from_node(node: QueryNode) -> Self {
        ElementQuery { node }
    }

    fn node(&self) -> &QueryNode {
        &self.node
    }

    fn decode(value: QueryValue) -> Option<ElementHandle> {
        match value {
            QueryValue::Element(element) => Some(element),
            _ => None,
        }
    }
}

impl ElementQuery {
    fn read<F>(&self, name: &str, arguments: Vec<CallArgument>, f: F) -> QueryNode
    where
        F: Fn(&dyn DomLibrary, &ElementHandle) -> QueryResult<QueryValue> + Send + Sync + 'static,
    {
        let description = self.description().append_call(name, arguments);
        map_output(self, description, move |backend, element| {
            Ok(f(backend.dom.as_ref(), &element)?)
        })
    }

    // Interactions resolve to the element they acted on
    fn act<F>(&self, name: &str, arguments: Vec<CallArgument>, f: F) -> ElementQuery
    where
        F: Fn(&dyn DomLibrary, &ElementHandle) -> QueryResult<()> + Send + Sync + 'static,
    {
        ElementQuery::from_node(self.read(name, arguments, move |dom, element| {
            f(dom, element)?;
            Ok(element.clone().into())
        }))
    }

    fn flag(
        &self,
        name: &str,
        f: fn(&dyn DomLibrary, &ElementHandle) -> QueryResult<bool>,
    ) -> ConditionQuery {
        ConditionQuery::from_node(self.read(name, vec![], move |dom, element| {
            Ok(f(dom, element)?.into())
        }))
    }

    /// First descendant matching `selector`.
    pub fn find_element(&self, selector: &str) -> ElementQuery {
        let description = self
            .description()
            .append_call("findElement", vec![selector.into()]);
        let described = description.clone();
        let selector = selector.to_string();
        ElementQuery::from_node(map_output(self, description, move |backend, element| {
            Ok(backend
                .dom
                .select_first(&selector, Some(&element), &described)?
                .into())
        }))
    }

    pub fn find_element_by(&self, locator: &Locator) -> QueryResult<ElementQuery> {
        Ok(self.find_element(locator.selector()?))
    }

    pub fn find_elements(&self, selector: &str) -> ArrayQuery<ElementQuery> {
        let selector = selector.to_string();
        ArrayQuery::from_node(self.read(
            "findElements",
            vec![selector.as_str().into()],
            move |dom, element| Ok(dom.select(&selector, Some(element))?.into()),
        ))
    }

    pub fn find_elements_by(&self, locator: &Locator) -> QueryResult<ArrayQuery<ElementQuery>> {
        Ok(self.find_elements(locator.selector()?))
    }

    /// False when this element, or any element it was found from, is missing.
    pub fn exists(&self) -> ConditionQuery {
        let description = self.description().append_call("exists", vec![]);
        ConditionQuery::from_node(self.node.derive(description, |parent, _| async move {
            match parent.perform().await {
                Ok(_) => Ok(QueryValue::Bool(true)),
                Err(err) if err.is(ErrorKind::NoSuchElement) => Ok(QueryValue::Bool(false)),
                Err(err) => Err(err.into()),
            }
        }))
    }

    pub fn get_attribute(&self, name: &str) -> NullableStringQuery {
        let attribute = name.to_string();
        NullableStringQuery::from_node(self.read(
            "getAttribute",
            vec![name.into()],
            move |dom, element| Ok(dom.attribute_of(element, &attribute)?.into()),
        ))
    }

    /// Visible text, empty for elements that are not displayed.
    pub fn get_text(&self) -> StringQuery {
        StringQuery::from_node(self.read("getText", vec![], |dom, element| {
            if dom.is_displayed(element)? {
                Ok(dom.text_of(element)?.into())
            } else {
                Ok(QueryValue::from(""))
            }
        }))
    }

    pub fn get_css_value(&self, property: &str) -> StringQuery {
        let css_property = property.to_string();
        StringQuery::from_node(self.read(
            "getCssValue",
            vec![property.into()],
            move |dom, element| Ok(dom.css_of(element, &css_property)?.into()),
        ))
    }

    pub fn get_tag_name(&self) -> StringQuery {
        StringQuery::from_node(self.read("getTagName", vec![], |dom, element| {
            Ok(dom.tag_name_of(element)?.into())
        }))
    }

    pub fn inner_html(&self) -> StringQuery {
        StringQuery::from_node(self.read("innerHTML", vec![], |dom, element| {
            Ok(dom.inner_html_of(element)?.into())
        }))
    }

    pub fn class(&self) -> StringQuery {
        StringQuery::from_node(self.read("class", vec![], |dom, element| {
            Ok(dom.class_of(element)?.into())
        }))
    }

    pub fn get_rect(&self) -> ObjectQuery {
        ObjectQuery::from_node(self.read("getRect", vec![], |dom, element| {
            Ok(dom.client_rect_of(element)?.to_value())
        }))
    }

    pub fn get_location(&self) -> ObjectQuery {
        ObjectQuery::from_node(self.read("getLocation", vec![], |dom, element| {
            Ok(dom.client_rect_of(element)?.location())
        }))
    }

    pub fn get_size(&self) -> ObjectQuery {
        ObjectQuery::from_node(self.read("getSize", vec![], |dom, element| {
            Ok(dom.client_rect_of(element)?.size())
        }))
    }

    pub fn is_displayed(&self) -> ConditionQuery {
        self.flag("isDisplayed", |dom, element| dom.is_displayed(element))
    }

    pub fn is_enabled(&self) -> ConditionQuery {
        self.flag("isEnabled", |dom, element| dom.is_enabled(element))
    }

    pub fn is_selected(&self) -> ConditionQuery {
        self.flag("isSelected", |dom, element| dom.is_selected(element))
    }

    pub fn is_checked(&self) -> ConditionQuery {
        self.flag("isChecked", |dom, element| dom.is_checked(element))
    }

    pub fn scroll_into_view(&self) -> ElementQuery {
        self.act("scrollIntoView", vec![], |dom, element| {
            dom.scroll_into_view(element)
        })
    }

    pub fn imitate_click(&self) -> ElementQuery {
        self.act("imitateClick", vec![], |dom, element| dom.imitate_click(element))
    }

    pub fn imitate_submit(&self) -> ElementQuery {
        self.act("imitateSubmit", vec![], |dom, element| {
            dom.imitate_submit(element)
        })
    }

    pub fn imitate_clear(&self) -> ElementQuery {
        self.act("imitateClear", vec![], |dom, element| dom.imitate_clear(element))
    }

    pub fn imitate_append_text(&self, text: &str) -> ElementQuery {
        let appended = text.to_string();
        self.act("imitateAppendText", vec![text.into()], move |dom, element| {
            dom.imitate_append_text(element, &appended)
        })
    }

    pub fn imitate_set_text(&self, text: &str) -> ElementQuery {
        let replacement = text.to_string();
        self.act("imitateSetText", vec![text.into()], move |dom, element| {
            dom.imitate_set_text(element, &replacement)
        })
    }

    /// Selects the matching options of a <select>, deselecting the rest.
    pub fn imitate_selection(&self, options: Vec<SelectOption>) -> ElementQuery {
        let arguments = vec![CallArgument::options(Some(&options))];
        self.act("imitateSelection", arguments, move |dom, element| {
            dom.imitate_selection(element, &options)
        })
    }

    pub fn get_selected_options(&self) -> ArrayQuery<ObjectQuery> {
        ArrayQuery::from_node(self.read("getSelectedOptions", vec![], |dom, element| {
            Ok(QueryValue::Array(dom.selected_options_of(element)?))
        }))
    }
}
